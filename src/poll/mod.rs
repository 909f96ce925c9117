// Poll payload and its normalization into a snapshot

use crate::office::{Office, OfficeDirectory, OfficeId};
use crate::pulse::MessageEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;


pub type AgentId = String;

/// Raw payload returned by the poll source.
///
/// Every list and flag is optional; a missing list means zero entities.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PollPayload {
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub offices: Vec<OfficeRecord>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    #[serde(default)]
    pub office_id: Option<String>,
    #[serde(default)]
    pub working: bool,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficeType {
    Main,
    Sub,
    #[default]
    Independent,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: OfficeType,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub agent_id: String,
    pub direction: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

/// Per-agent status flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub working: bool,
    pub unread: bool,
}

impl AgentStatus {
    pub fn new(working: bool, unread: bool) -> Self {
        Self { working, unread }
    }
}

/// One agent as seen by a poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentState {
    pub office_id: OfficeId,
    pub status: AgentStatus,
}

/// Normalized point-in-time view of agents, offices and events
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub agents: BTreeMap<AgentId, AgentState>,
    pub offices: OfficeDirectory,
    pub events: Vec<MessageEvent>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize a raw payload.
    ///
    /// Agents without an id or office are dropped, duplicate agent ids keep
    /// the first record, events with an unknown direction are dropped.
    pub fn from_payload(payload: PollPayload) -> Self {
        let mut agents = BTreeMap::new();
        for record in payload.agents {
            if record.id.is_empty() {
                debug!("Agent record without id, skipping");
                continue;
            }
            let office_id = match record.office_id {
                Some(office_id) if !office_id.is_empty() => office_id,
                _ => {
                    debug!(agent_id = %record.id, "Agent without office, skipping");
                    continue;
                }
            };
            if agents.contains_key(&record.id) {
                debug!(agent_id = %record.id, "Duplicate agent in poll, keeping first");
                continue;
            }
            agents.insert(
                record.id,
                AgentState {
                    office_id,
                    status: AgentStatus::new(record.working, record.unread),
                },
            );
        }

        let offices = OfficeDirectory::new(payload.offices.iter().filter_map(Office::from_record));

        let events = payload
            .events
            .iter()
            .filter_map(|record| match MessageEvent::try_from(record) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(agent_id = %record.agent_id, error = %e, "Dropping malformed event");
                    None
                }
            })
            .collect();

        Self {
            agents,
            offices,
            events,
        }
    }

    /// Agent ids per office, sorted, for offices known to the directory
    pub fn rosters(&self) -> BTreeMap<OfficeId, Vec<AgentId>> {
        let mut rosters: BTreeMap<OfficeId, Vec<AgentId>> = self
            .offices
            .ids()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        for (agent_id, state) in &self.agents {
            if let Some(roster) = rosters.get_mut(&state.office_id) {
                roster.push(agent_id.clone());
            }
        }
        rosters
    }

    pub fn status_by_agent(&self) -> BTreeMap<AgentId, AgentStatus> {
        self.agents
            .iter()
            .map(|(id, state)| (id.clone(), state.status))
            .collect()
    }
}
