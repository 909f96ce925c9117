// Update pipeline: poll, diff, layout, pulses, health, compose

pub mod metrics;
mod pipeline;
mod runtime;

#[cfg(test)]
mod tests;

pub use metrics::{run_metrics_reporter, EngineMetrics, MetricsSnapshot};
pub use pipeline::{SceneEngine, SceneUpdate};
pub use runtime::run;

use chrono::Utc;

/// Current wall-clock time in Unix epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
