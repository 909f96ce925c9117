use super::{MessageEvent, Pulse};
use crate::poll::AgentId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Result of ingesting one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// No pulse was showing for the agent
    Created,
    /// A newer event replaced the agent's pulse
    Replaced,
    /// Timestamp not newer than the last accepted one for the agent
    Stale,
    /// Agent is not in the current roster
    UnknownAgent,
}

impl IngestOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, IngestOutcome::Created | IngestOutcome::Replaced)
    }
}

/// Tracks at most one pulse per agent with a fixed time-to-live.
///
/// The newest event timestamp per agent wins regardless of arrival order.
/// The last accepted timestamp is remembered after the pulse expires, so an
/// event seen again on a later poll never brings a pulse back. Marks of
/// agents that left the roster are kept only until their last event would
/// have expired.
pub struct PulseTracker {
    ttl_ms: i64,

    /// Agents events are accepted for
    roster: HashSet<AgentId>,

    /// Agent id -> current pulse
    pulses: BTreeMap<AgentId, Pulse>,

    /// Agent id -> newest accepted event timestamp
    high_water: HashMap<AgentId, i64>,
}

impl PulseTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            roster: HashSet::new(),
            pulses: BTreeMap::new(),
            high_water: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms as u64)
    }

    /// Replace the set of live agents.
    ///
    /// Pulses of agents no longer in the roster are dropped. Returns the
    /// number of pulses dropped.
    pub fn set_roster<I, S>(&mut self, agent_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<AgentId>,
    {
        self.roster = agent_ids.into_iter().map(Into::into).collect();

        let before = self.pulses.len();
        let roster = &self.roster;
        self.pulses.retain(|agent_id, _| roster.contains(agent_id));
        before - self.pulses.len()
    }

    /// Record an event, replacing the agent's pulse if the event is newer
    pub fn ingest(&mut self, event: &MessageEvent) -> IngestOutcome {
        if !self.roster.contains(&event.agent_id) {
            debug!(agent_id = %event.agent_id, "Event for unknown agent, dropping");
            return IngestOutcome::UnknownAgent;
        }

        if let Some(&last) = self.high_water.get(&event.agent_id) {
            if event.timestamp <= last {
                return IngestOutcome::Stale;
            }
        }
        self.high_water.insert(event.agent_id.clone(), event.timestamp);

        let pulse = Pulse {
            agent_id: event.agent_id.clone(),
            direction: event.direction,
            timestamp: event.timestamp,
            expires_at: event.timestamp.saturating_add(self.ttl_ms),
        };

        match self.pulses.insert(event.agent_id.clone(), pulse) {
            Some(_) => IngestOutcome::Replaced,
            None => IngestOutcome::Created,
        }
    }

    /// Drop expired pulses and return the active ones (sorted by agent id)
    pub fn tick(&mut self, now: i64) -> Vec<Pulse> {
        self.pulses.retain(|_, pulse| pulse.is_active(now));

        let (roster, ttl_ms) = (&self.roster, self.ttl_ms);
        self.high_water.retain(|agent_id, last| {
            roster.contains(agent_id) || now < last.saturating_add(ttl_ms)
        });

        self.pulses.values().cloned().collect()
    }

    /// Newest accepted event timestamp of an agent
    pub fn last_accepted(&self, agent_id: &str) -> Option<i64> {
        self.high_water.get(agent_id).copied()
    }

    /// Number of agents with a remembered event timestamp
    pub fn remembered(&self) -> usize {
        self.high_water.len()
    }

    /// Current pulse of an agent, expired or not
    pub fn get(&self, agent_id: &str) -> Option<&Pulse> {
        self.pulses.get(agent_id)
    }

    /// Remove an agent's pulse explicitly
    pub fn clear(&mut self, agent_id: &str) -> Option<Pulse> {
        self.pulses.remove(agent_id)
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}
