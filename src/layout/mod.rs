// Layout resolver: deterministic agent placement inside office templates

mod resolver;

pub use resolver::{compute_layout, LayoutResolver, ResolverStats};

use crate::office::OfficeId;
use crate::poll::AgentId;
use crate::template::{Cell, Furniture, OfficeTemplate, Room};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// What happens to agents beyond the seat capacity of an office
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Place extra agents in the overflow strip below the building
    #[default]
    Spill,
    /// Leave extra agents unseated and report the shortfall
    Report,
}

/// Identity of an office's agent membership
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RosterSignature {
    pub office_id: OfficeId,
    /// Sorted, de-duplicated agent ids
    pub members: Vec<AgentId>,
    pub digest: u64,
}

impl RosterSignature {
    /// Signature of a roster, independent of input order and duplicates
    pub fn new<I, S>(office_id: &str, agent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut members: Vec<AgentId> = agent_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();
        members.sort();
        members.dedup();

        let mut hasher = DefaultHasher::new();
        office_id.hash(&mut hasher);
        members.hash(&mut hasher);

        Self {
            office_id: office_id.to_string(),
            members,
            digest: hasher.finish(),
        }
    }
}

/// Where an agent sits
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "room", rename_all = "snake_case")]
pub enum PlacementArea {
    Room(String),
    Overflow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentPlacement {
    pub agent_id: AgentId,
    pub area: PlacementArea,
    pub cell: Cell,
}

/// Roster larger than the seat capacity of an office
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapacityExceeded {
    pub office_id: OfficeId,
    pub capacity: usize,
    pub requested: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "office '{}' seats {} agents but {} were assigned",
            self.office_id, self.capacity, self.requested
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    UnknownOffice(OfficeId),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::UnknownOffice(id) => write!(f, "no template for office '{}'", id),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Rooms, furniture and agent placements of one office.
///
/// Immutable once computed for a roster signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildingLayout {
    pub office_id: OfficeId,
    #[serde(skip)]
    pub signature: RosterSignature,
    pub template: Arc<OfficeTemplate>,
    /// Sorted by agent id
    pub placements: Vec<AgentPlacement>,
    /// Agents left without a cell under `OverflowPolicy::Report`
    pub unseated: Vec<AgentId>,
    pub capacity: Option<CapacityExceeded>,
}

impl BuildingLayout {
    pub fn rooms(&self) -> &[Room] {
        self.template.rooms()
    }

    pub fn furniture(&self) -> &[Furniture] {
        self.template.furniture()
    }

    /// All agents of the roster, placed or not
    pub fn members(&self) -> &[AgentId] {
        &self.signature.members
    }

    pub fn placement(&self, agent_id: &str) -> Option<&AgentPlacement> {
        self.placements
            .binary_search_by(|p| p.agent_id.as_str().cmp(agent_id))
            .ok()
            .map(|i| &self.placements[i])
    }
}
