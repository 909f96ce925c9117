// Hierarchical health aggregation over the office forest

use crate::office::{OfficeDirectory, OfficeId, OfficeKind};
use crate::poll::{AgentId, AgentState, AgentStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;


/// Agent counts for one office or subtree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub total: usize,
    pub working: usize,
    pub idle: usize,
    pub unread: usize,
}

impl HealthCounts {
    pub fn record(&mut self, status: AgentStatus) {
        self.total += 1;
        if status.working {
            self.working += 1;
        } else {
            self.idle += 1;
        }
        if status.unread {
            self.unread += 1;
        }
    }

    pub fn merge(&mut self, other: &HealthCounts) {
        self.total += other.total;
        self.working += other.working;
        self.idle += other.idle;
        self.unread += other.unread;
    }
}

/// Aggregate indicator shown on an office
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Empty,
    Idle,
    Working,
    /// At least one agent has unread messages
    NeedsAttention,
}

impl HealthStatus {
    pub fn from_counts(counts: &HealthCounts) -> Self {
        if counts.total == 0 {
            HealthStatus::Empty
        } else if counts.unread > 0 {
            HealthStatus::NeedsAttention
        } else if counts.working > 0 {
            HealthStatus::Working
        } else {
            HealthStatus::Idle
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OfficeHealth {
    /// Agents directly in the office
    pub own: HealthCounts,
    /// Own agents plus all descendant sub-offices
    pub rolled_up: HealthCounts,
    /// Derived from `rolled_up`
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyError {
    /// Offices whose parent chain loops back on itself, starting at the
    /// smallest id
    MalformedHierarchy { cycle: Vec<OfficeId> },
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyError::MalformedHierarchy { cycle } => {
                write!(f, "office hierarchy contains a cycle: {}", cycle.join(" -> "))
            }
        }
    }
}

impl std::error::Error for HierarchyError {}

/// Health of every well-formed office plus the cycles that were found
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HealthReport {
    pub by_office: BTreeMap<OfficeId, OfficeHealth>,
    pub malformed: Vec<HierarchyError>,
}

impl HealthReport {
    pub fn get(&self, office_id: &str) -> Option<&OfficeHealth> {
        self.by_office.get(office_id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Rooted,
    Broken,
}

/// Parent of an office if that parent exists in the directory
fn known_parent<'a>(offices: &'a OfficeDirectory, office_id: &str) -> Option<&'a str> {
    let parent = offices.get(office_id)?.kind.parent()?;
    if offices.contains(parent) {
        Some(parent)
    } else {
        debug!(office_id = %office_id, parent = %parent, "Parent office not in poll, treating as root");
        None
    }
}

/// Ancestors an office's counts roll up into.
///
/// Only a chain of sub-offices ending at a main office rolls up; an office
/// under an independent office or a dangling parent rolls up nowhere.
fn rollup_chain<'a>(offices: &'a OfficeDirectory, office_id: &str) -> Vec<&'a str> {
    let mut chain = Vec::new();
    let mut current = office_id;
    while let Some(parent) = known_parent(offices, current) {
        chain.push(parent);
        match offices.get(parent).map(|office| &office.kind) {
            Some(OfficeKind::Main) => return chain,
            Some(OfficeKind::Sub { .. }) => current = parent,
            _ => break,
        }
    }
    Vec::new()
}

/// Walk every parent chain once, marking offices that reach a root as
/// `Rooted` and offices on or below a cycle as `Broken`.
fn classify(offices: &OfficeDirectory) -> (HashMap<&str, Mark>, Vec<HierarchyError>) {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut malformed = Vec::new();

    for start in offices.ids() {
        let mut path: Vec<&str> = Vec::new();
        let mut current = Some(start.as_str());

        let outcome = loop {
            let Some(id) = current else {
                break Mark::Rooted;
            };
            if let Some(&mark) = marks.get(id) {
                break mark;
            }
            if let Some(pos) = path.iter().position(|p| *p == id) {
                let mut cycle: Vec<OfficeId> = path[pos..].iter().map(|s| s.to_string()).collect();
                if let Some(min) = cycle
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.cmp(b.1))
                    .map(|(i, _)| i)
                {
                    cycle.rotate_left(min);
                }
                malformed.push(HierarchyError::MalformedHierarchy { cycle });
                break Mark::Broken;
            }
            path.push(id);
            current = known_parent(offices, id);
        };

        for id in path {
            marks.insert(id, outcome);
        }
    }

    (marks, malformed)
}

/// Roll up per-agent status into per-office health.
///
/// Each office counts its own agents. Main offices, and sub-offices inside
/// a main office's tree, additionally fold in their descendant sub-offices;
/// independent offices never do. Offices on or below a parent cycle are left
/// out and the cycle is reported; other trees are unaffected.
pub fn aggregate(offices: &OfficeDirectory, agents: &BTreeMap<AgentId, AgentState>) -> HealthReport {
    let mut own: HashMap<&str, HealthCounts> = HashMap::new();
    for state in agents.values() {
        if offices.contains(&state.office_id) {
            own.entry(state.office_id.as_str())
                .or_default()
                .record(state.status);
        }
    }

    let (marks, malformed) = classify(offices);

    let mut rolled_up: HashMap<&str, HealthCounts> = HashMap::new();
    for office in offices.iter() {
        if marks.get(office.id.as_str()) != Some(&Mark::Rooted) {
            continue;
        }
        let counts = own.get(office.id.as_str()).copied().unwrap_or_default();

        rolled_up.entry(office.id.as_str()).or_default().merge(&counts);
        for ancestor in rollup_chain(offices, &office.id) {
            rolled_up.entry(ancestor).or_default().merge(&counts);
        }
    }

    let by_office = offices
        .iter()
        .filter_map(|office| {
            let rolled_up = *rolled_up.get(office.id.as_str())?;
            Some((
                office.id.clone(),
                OfficeHealth {
                    own: own.get(office.id.as_str()).copied().unwrap_or_default(),
                    rolled_up,
                    status: HealthStatus::from_counts(&rolled_up),
                },
            ))
        })
        .collect();

    HealthReport {
        by_office,
        malformed,
    }
}
