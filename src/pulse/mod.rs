// Event lifecycle: decaying per-agent message pulses

mod tracker;

pub use tracker::{IngestOutcome, PulseTracker};

use crate::poll::{AgentId, EventRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Send,
    Receive,
}

impl FromStr for Direction {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "send" | "sent" => Ok(Direction::Send),
            "receive" | "received" => Ok(Direction::Receive),
            other => Err(EventError::UnknownDirection(other.to_string())),
        }
    }
}

/// Errors converting a raw event record
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    MissingAgent,
    UnknownDirection(String),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::MissingAgent => write!(f, "event has no agent id"),
            EventError::UnknownDirection(d) => write!(f, "unknown event direction '{}'", d),
        }
    }
}

impl std::error::Error for EventError {}

/// A message send/receive by one agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub agent_id: AgentId,
    pub direction: Direction,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl MessageEvent {
    pub fn new(agent_id: &str, direction: Direction, timestamp: i64) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            direction,
            timestamp,
        }
    }
}

impl TryFrom<&EventRecord> for MessageEvent {
    type Error = EventError;

    fn try_from(record: &EventRecord) -> Result<Self, Self::Error> {
        if record.agent_id.is_empty() {
            return Err(EventError::MissingAgent);
        }
        Ok(Self {
            agent_id: record.agent_id.clone(),
            direction: record.direction.parse()?,
            timestamp: record.timestamp,
        })
    }
}

/// Visual indicator for the most recent message of one agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pulse {
    pub agent_id: AgentId,
    pub direction: Direction,
    /// Timestamp of the event that created the pulse
    pub timestamp: i64,
    /// First instant (ms) at which the pulse is no longer shown
    pub expires_at: i64,
}

impl Pulse {
    pub fn is_active(&self, now: i64) -> bool {
        now < self.expires_at
    }
}
