// Scene composition: immutable, versioned view handed to the renderer

mod export;

pub use export::{run_scene_export, save_scene};

use crate::health::OfficeHealth;
use crate::layout::{AgentPlacement, BuildingLayout};
use crate::office::{Office, OfficeDirectory, OfficeId};
use crate::poll::{AgentId, AgentStatus};
use crate::pulse::Pulse;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What caused a composition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneTrigger {
    Initial,
    Poll,
    Decay,
}

/// Everything the renderer needs for one agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentView {
    pub status: AgentStatus,
    /// None for agents left unseated by the overflow policy
    pub placement: Option<AgentPlacement>,
    pub pulse: Option<Pulse>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OfficeScene {
    pub office: Office,
    pub layout: Arc<BuildingLayout>,
    pub agents: BTreeMap<AgentId, AgentView>,
    pub health: Option<OfficeHealth>,
}

/// Composed, read-only scene. Replaced wholesale on every composition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub version: u64,
    /// Unix epoch milliseconds
    pub composed_at: i64,
    pub trigger: SceneTrigger,
    pub offices: BTreeMap<OfficeId, OfficeScene>,
}

impl SceneSnapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            composed_at: 0,
            trigger: SceneTrigger::Initial,
            offices: BTreeMap::new(),
        }
    }

    pub fn office(&self, office_id: &str) -> Option<&OfficeScene> {
        self.offices.get(office_id)
    }

    /// Find an agent in any office
    pub fn agent(&self, agent_id: &str) -> Option<&AgentView> {
        self.offices
            .values()
            .find_map(|office| office.agents.get(agent_id))
    }

    pub fn agent_count(&self) -> usize {
        self.offices.values().map(|o| o.agents.len()).sum()
    }
}

/// Inputs of one composition
pub struct ComposeInput<'a> {
    pub version: u64,
    pub composed_at: i64,
    pub trigger: SceneTrigger,
    pub offices: &'a OfficeDirectory,
    pub layouts: &'a BTreeMap<OfficeId, Arc<BuildingLayout>>,
    pub statuses: &'a BTreeMap<AgentId, AgentStatus>,
    pub pulses: &'a BTreeMap<AgentId, Pulse>,
    pub health: &'a BTreeMap<OfficeId, OfficeHealth>,
}

/// Merge layouts, statuses, pulses and health into a scene.
///
/// Every member of a layout gets a view; a missing status defaults to
/// idle/read. Offices without a layout are omitted.
pub fn compose(input: &ComposeInput<'_>) -> SceneSnapshot {
    let mut offices = BTreeMap::new();

    for (office_id, layout) in input.layouts {
        let Some(office) = input.offices.get(office_id) else {
            continue;
        };

        let agents = layout
            .members()
            .iter()
            .map(|agent_id| {
                let view = AgentView {
                    status: input.statuses.get(agent_id).copied().unwrap_or_default(),
                    placement: layout.placement(agent_id).cloned(),
                    pulse: input.pulses.get(agent_id).cloned(),
                };
                (agent_id.clone(), view)
            })
            .collect();

        offices.insert(
            office_id.clone(),
            OfficeScene {
                office: office.clone(),
                layout: Arc::clone(layout),
                agents,
                health: input.health.get(office_id).copied(),
            },
        );
    }

    SceneSnapshot {
        version: input.version,
        composed_at: input.composed_at,
        trigger: input.trigger,
        offices,
    }
}
