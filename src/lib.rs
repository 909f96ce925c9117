// Configuration
pub mod config;

// Office model and directory
pub mod office;

// Poll payload and snapshot normalization
pub mod poll;

// Room and furniture templates
pub mod template;

// Agent placement inside templates
pub mod layout;

// Snapshot differ
pub mod diff;

// Message pulses
pub mod pulse;

// Hierarchical health aggregation
pub mod health;

// Scene composition and export
pub mod scene;

// Poll sources
pub mod source;

// Update pipeline and actor loop
pub mod engine;

pub use engine::{SceneEngine, SceneUpdate};
pub use scene::SceneSnapshot;
