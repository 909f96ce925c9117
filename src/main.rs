use anyhow::{Context, Result};
use office_scene::config::{load_config, SceneConfig};
use office_scene::engine::{run, run_metrics_reporter, SceneEngine};
use office_scene::scene::run_scene_export;
use office_scene::source;
use office_scene::template::TemplateSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "office_scene=info".into()),
        )
        .init();

    info!("Office scene engine starting...");

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("OFFICE_SCENE_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("office-scene.toml"));

    let config = if config_path.exists() {
        load_config(&config_path)?
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
        SceneConfig::default()
    };

    info!(
        config = %config_path.display(),
        source = ?config.source.kind,
        templates = %config.templates.path.display(),
        overflow_policy = ?config.engine.overflow_policy,
        "Configuration loaded"
    );

    let templates = Arc::new(
        TemplateSet::load(&config.templates.path).context("Failed to load office templates")?,
    );
    let poll_source = source::from_config(&config.source)?;

    let engine = SceneEngine::new(templates, &config.engine);

    let export_handle = config
        .output
        .scene_path
        .clone()
        .map(|path| tokio::spawn(run_scene_export(engine.watch(), path)));

    let metrics_handle = (config.metrics.report_interval_seconds > 0).then(|| {
        tokio::spawn(run_metrics_reporter(
            engine.metrics.clone(),
            config.metrics.report_interval_seconds,
        ))
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl_c signal");
        }
        info!("Shutdown signal received");
    };

    let engine = run(engine, poll_source, &config.engine, shutdown).await?;

    // Graceful shutdown
    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    let metrics = engine.metrics.get_snapshot();
    let version = engine.version();

    // Closes the scene channel; the export task writes the last scene and exits
    drop(engine);
    if let Some(handle) = export_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Scene export task failed");
        }
    }

    info!(
        version = version,
        polls_applied = metrics.polls_applied,
        compositions = metrics.compositions,
        "Office scene engine stopped"
    );

    Ok(())
}
