use super::{Furniture, OfficeTemplate, Room, TemplateError};
use crate::office::OfficeId;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Rooms and furniture as written in the templates file
#[derive(Debug, Default, Deserialize)]
struct TemplateSpec {
    #[serde(default)]
    rooms: Vec<Room>,
    #[serde(default)]
    furniture: Vec<Furniture>,
}

#[derive(Debug, Deserialize)]
struct OfficeTemplateSpec {
    id: OfficeId,
    #[serde(flatten)]
    template: TemplateSpec,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    offices: Vec<OfficeTemplateSpec>,
    #[serde(default)]
    fallback: Option<TemplateSpec>,
}

/// Static set of office templates, loaded once at startup
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    templates: BTreeMap<OfficeId, Arc<OfficeTemplate>>,

    /// Used for offices without a dedicated template
    fallback: Option<Arc<OfficeTemplate>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the template for one office.
    ///
    /// Fails if the office already has a template.
    pub fn insert(&mut self, office_id: &str, template: OfficeTemplate) -> Result<(), TemplateError> {
        if self.templates.contains_key(office_id) {
            return Err(TemplateError::DuplicateOffice(office_id.to_string()));
        }
        self.templates.insert(office_id.to_string(), Arc::new(template));
        Ok(())
    }

    pub fn set_fallback(&mut self, template: OfficeTemplate) {
        self.fallback = Some(Arc::new(template));
    }

    /// Template for an office, falling back to the shared one if configured
    pub fn get(&self, office_id: &str) -> Option<&Arc<OfficeTemplate>> {
        self.templates.get(office_id).or(self.fallback.as_ref())
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Number of dedicated (non-fallback) templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.fallback.is_none()
    }

    /// Parse and validate a TOML templates document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: TemplateFile =
            toml::from_str(contents).context("Failed to parse templates TOML")?;

        let mut set = TemplateSet::new();
        for office in file.offices {
            let template = OfficeTemplate::new(office.template.rooms, office.template.furniture)
                .with_context(|| format!("Invalid template for office '{}'", office.id))?;
            set.insert(&office.id, template)?;
        }

        if let Some(spec) = file.fallback {
            let template = OfficeTemplate::new(spec.rooms, spec.furniture)
                .context("Invalid fallback template")?;
            set.set_fallback(template);
        }

        Ok(set)
    }

    /// Load templates from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read templates file {}", path.display()))?;
        let set = Self::from_toml_str(&contents)?;

        info!(
            path = %path.display(),
            offices = set.len(),
            fallback = set.has_fallback(),
            "Loaded office templates"
        );

        Ok(set)
    }
}
