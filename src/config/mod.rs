use crate::layout::OverflowPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete office-scene configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Update pipeline timing and policies
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How often the poll source is queried
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How often expired pulses are swept
    #[serde(default = "default_decay_interval_ms")]
    pub decay_interval_ms: u64,
    /// How long a message pulse stays visible
    #[serde(default = "default_pulse_ttl_ms")]
    pub pulse_ttl_ms: u64,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_decay_interval_ms() -> u64 {
    500
}

fn default_pulse_ttl_ms() -> u64 {
    5000
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn decay_interval(&self) -> Duration {
        Duration::from_millis(self.decay_interval_ms.max(1))
    }

    pub fn pulse_ttl(&self) -> Duration {
        Duration::from_millis(self.pulse_ttl_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            decay_interval_ms: default_decay_interval_ms(),
            pulse_ttl_ms: default_pulse_ttl_ms(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Http,
    File,
}

/// Where snapshots are polled from
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_source_url")]
    pub url: String,
    /// Snapshot JSON file for `kind = "file"`
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_source_url() -> String {
    std::env::var("OFFICE_SCENE_SOURCE_URL")
        .unwrap_or_else(|_| "http://localhost:3000/api/snapshot".to_string())
}

fn default_timeout_ms() -> u64 {
    2000
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            url: default_source_url(),
            path: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_templates_path")]
    pub path: PathBuf,
}

fn default_templates_path() -> PathBuf {
    PathBuf::from("templates.toml")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: default_templates_path(),
        }
    }
}

/// Scene export for file-based renderers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Written after every composition when set (gzip if it ends in .gz)
    #[serde(default)]
    pub scene_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// How often engine metrics are logged (seconds, 0 disables)
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
}

fn default_report_interval() -> u64 {
    30
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_seconds: default_report_interval(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<SceneConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SceneConfig = toml::from_str(&contents).context("Failed to parse config TOML")?;
    Ok(config)
}
