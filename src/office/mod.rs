// Office model: typed office kinds and the per-snapshot office directory

use crate::poll::{OfficeRecord, OfficeType};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};


pub type OfficeId = String;

/// Office category. Only sub-offices carry a parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfficeKind {
    Main,
    Sub { parent: OfficeId },
    Independent,
}

impl OfficeKind {
    pub fn parent(&self) -> Option<&str> {
        match self {
            OfficeKind::Sub { parent } => Some(parent),
            OfficeKind::Main | OfficeKind::Independent => None,
        }
    }
}

/// A named, colored grouping of agents
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Office {
    pub id: OfficeId,
    pub name: String,
    pub kind: OfficeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl Office {
    fn with_kind(id: &str, name: &str, kind: OfficeKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            color: None,
            repo: None,
            chat_id: None,
        }
    }

    pub fn main(id: &str, name: &str) -> Self {
        Self::with_kind(id, name, OfficeKind::Main)
    }

    pub fn sub(id: &str, name: &str, parent: &str) -> Self {
        Self::with_kind(
            id,
            name,
            OfficeKind::Sub {
                parent: parent.to_string(),
            },
        )
    }

    pub fn independent(id: &str, name: &str) -> Self {
        Self::with_kind(id, name, OfficeKind::Independent)
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Build a typed office from a polled record.
    ///
    /// Returns None for records without an id. Inconsistent records are
    /// normalized rather than rejected:
    /// - `sub` without a parent becomes `independent`
    /// - a parent on `main`/`independent` is ignored
    /// - an unknown type becomes `independent`
    pub fn from_record(record: &OfficeRecord) -> Option<Self> {
        if record.id.is_empty() {
            debug!("Office record without id, skipping");
            return None;
        }

        let parent = record.parent_id.as_deref().filter(|p| !p.is_empty());

        let kind = match (&record.kind, parent) {
            (OfficeType::Sub, Some(parent)) if parent == record.id => {
                warn!(office_id = %record.id, "Sub-office lists itself as parent, treating as independent");
                OfficeKind::Independent
            }
            (OfficeType::Sub, Some(parent)) => OfficeKind::Sub {
                parent: parent.to_string(),
            },
            (OfficeType::Sub, None) => {
                warn!(office_id = %record.id, "Sub-office without parent, treating as independent");
                OfficeKind::Independent
            }
            (OfficeType::Main, parent) => {
                if parent.is_some() {
                    warn!(office_id = %record.id, "Main office carries a parent, ignoring it");
                }
                OfficeKind::Main
            }
            (OfficeType::Independent, parent) => {
                if parent.is_some() {
                    warn!(office_id = %record.id, "Independent office carries a parent, ignoring it");
                }
                OfficeKind::Independent
            }
            (OfficeType::Unknown, _) => {
                warn!(office_id = %record.id, "Unknown office type, treating as independent");
                OfficeKind::Independent
            }
        };

        let name = if record.name.is_empty() {
            record.id.clone()
        } else {
            record.name.clone()
        };

        Some(Self {
            id: record.id.clone(),
            name,
            kind,
            color: record.color.clone(),
            repo: record.repo.clone(),
            chat_id: record.chat_id.clone(),
        })
    }
}

/// All offices of one snapshot, keyed by id, with a parent → children index
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OfficeDirectory {
    offices: BTreeMap<OfficeId, Office>,
    children: BTreeMap<OfficeId, Vec<OfficeId>>,
}

impl OfficeDirectory {
    /// Build a directory. Duplicate ids keep the first occurrence.
    pub fn new<I: IntoIterator<Item = Office>>(offices: I) -> Self {
        let mut by_id: BTreeMap<OfficeId, Office> = BTreeMap::new();
        for office in offices {
            if by_id.contains_key(&office.id) {
                debug!(office_id = %office.id, "Duplicate office in poll, keeping first");
                continue;
            }
            by_id.insert(office.id.clone(), office);
        }

        let mut children: BTreeMap<OfficeId, Vec<OfficeId>> = BTreeMap::new();
        for office in by_id.values() {
            if let Some(parent) = office.kind.parent() {
                children
                    .entry(parent.to_string())
                    .or_default()
                    .push(office.id.clone());
            }
        }

        Self {
            offices: by_id,
            children,
        }
    }

    pub fn get(&self, office_id: &str) -> Option<&Office> {
        self.offices.get(office_id)
    }

    pub fn contains(&self, office_id: &str) -> bool {
        self.offices.contains_key(office_id)
    }

    /// Offices in id order
    pub fn iter(&self) -> impl Iterator<Item = &Office> {
        self.offices.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &OfficeId> {
        self.offices.keys()
    }

    /// Direct sub-offices of `office_id` (sorted by id)
    pub fn children_of(&self, office_id: &str) -> &[OfficeId] {
        self.children
            .get(office_id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.offices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offices.is_empty()
    }
}
