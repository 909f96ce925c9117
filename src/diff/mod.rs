// Snapshot differ: minimal delta between two polls

use crate::office::OfficeId;
use crate::poll::{AgentId, AgentStatus, Snapshot};
use serde::Serialize;
use std::collections::BTreeSet;


/// Agent that appeared or disappeared
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentEntry {
    pub id: AgentId,
    pub office_id: OfficeId,
    pub status: AgentStatus,
}

/// Agent whose status flags changed within the same office
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentChange {
    pub id: AgentId,
    pub office_id: OfficeId,
    pub previous: AgentStatus,
    pub current: AgentStatus,
}

/// Agent that changed office membership
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentMove {
    pub id: AgentId,
    pub from: OfficeId,
    pub to: OfficeId,
    pub previous: AgentStatus,
    pub current: AgentStatus,
}

/// Differences between two snapshots. All lists are sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub added: Vec<AgentEntry>,
    pub removed: Vec<AgentEntry>,
    pub changed: Vec<AgentChange>,
    pub moved: Vec<AgentMove>,
    pub offices_added: Vec<OfficeId>,
    pub offices_removed: Vec<OfficeId>,
    pub offices_changed: Vec<OfficeId>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
            && self.offices_added.is_empty()
            && self.offices_removed.is_empty()
            && self.offices_changed.is_empty()
    }

    /// Offices whose agent membership changed.
    ///
    /// Flag-only changes are never included.
    pub fn roster_changes(&self) -> BTreeSet<OfficeId> {
        let mut offices = BTreeSet::new();
        for entry in self.added.iter().chain(&self.removed) {
            offices.insert(entry.office_id.clone());
        }
        for moved in &self.moved {
            offices.insert(moved.from.clone());
            offices.insert(moved.to.clone());
        }
        offices
    }

    /// Every agent that needs a redraw
    pub fn dirty_agents(&self) -> BTreeSet<AgentId> {
        self.added
            .iter()
            .chain(&self.removed)
            .map(|e| e.id.clone())
            .chain(self.changed.iter().map(|c| c.id.clone()))
            .chain(self.moved.iter().map(|m| m.id.clone()))
            .collect()
    }

    /// Every office whose record or roster changed
    pub fn dirty_offices(&self) -> BTreeSet<OfficeId> {
        let mut offices = self.roster_changes();
        offices.extend(self.offices_added.iter().cloned());
        offices.extend(self.offices_removed.iter().cloned());
        offices.extend(self.offices_changed.iter().cloned());
        offices.extend(self.changed.iter().map(|c| c.office_id.clone()));
        offices
    }

    /// Human-readable one-line summary for logs
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }

        let mut parts = Vec::new();
        let counts = [
            (self.added.len(), "agent(s) added"),
            (self.removed.len(), "agent(s) removed"),
            (self.changed.len(), "agent(s) changed"),
            (self.moved.len(), "agent(s) moved"),
            (self.offices_added.len(), "office(s) added"),
            (self.offices_removed.len(), "office(s) removed"),
            (self.offices_changed.len(), "office(s) changed"),
        ];
        for (count, label) in counts {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        parts.join(", ")
    }
}

/// Compare two snapshots by identity plus a shallow comparison of the
/// status flags and office records.
///
/// Identical snapshots always produce an empty delta.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Delta {
    let mut delta = Delta::default();

    for (id, before) in &previous.agents {
        match current.agents.get(id) {
            None => delta.removed.push(AgentEntry {
                id: id.clone(),
                office_id: before.office_id.clone(),
                status: before.status,
            }),
            Some(after) if after.office_id != before.office_id => delta.moved.push(AgentMove {
                id: id.clone(),
                from: before.office_id.clone(),
                to: after.office_id.clone(),
                previous: before.status,
                current: after.status,
            }),
            Some(after) if after.status != before.status => delta.changed.push(AgentChange {
                id: id.clone(),
                office_id: after.office_id.clone(),
                previous: before.status,
                current: after.status,
            }),
            Some(_) => {}
        }
    }

    for (id, after) in &current.agents {
        if !previous.agents.contains_key(id) {
            delta.added.push(AgentEntry {
                id: id.clone(),
                office_id: after.office_id.clone(),
                status: after.status,
            });
        }
    }

    for office in previous.offices.iter() {
        match current.offices.get(&office.id) {
            None => delta.offices_removed.push(office.id.clone()),
            Some(after) if after != office => delta.offices_changed.push(office.id.clone()),
            Some(_) => {}
        }
    }

    for office in current.offices.iter() {
        if !previous.offices.contains(&office.id) {
            delta.offices_added.push(office.id.clone());
        }
    }

    delta
}
