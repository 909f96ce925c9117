use super::SceneSnapshot;
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Write a scene to disk as JSON, gzip-compressed when the path ends in `.gz`.
///
/// Uses atomic write: writes to a .tmp file, fsyncs, then renames, so a
/// renderer reading the file never sees a partial scene. The .tmp file is
/// removed if any step fails.
pub fn save_scene(scene: &SceneSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_vec(scene).context("Failed to serialize scene to JSON")?;

    let compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let tmp_path = path.with_extension("tmp");

    let result = write_and_rename(&json, compressed, &tmp_path, path);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_rename(json: &[u8], compressed: bool, tmp_path: &Path, path: &Path) -> Result<()> {
    let mut tmp_file = File::create(tmp_path).context("Failed to create temporary scene file")?;

    if compressed {
        let mut encoder = GzEncoder::new(tmp_file, Compression::default());
        encoder
            .write_all(json)
            .context("Failed to write compressed scene data")?;
        tmp_file = encoder.finish().context("Failed to finish compression")?;
    } else {
        tmp_file.write_all(json).context("Failed to write scene data")?;
    }

    tmp_file.sync_all().context("Failed to sync scene file to disk")?;
    drop(tmp_file);

    fs::rename(tmp_path, path).context("Failed to rename temporary scene file")?;

    Ok(())
}

/// Write every new scene to `path` until the sending engine is dropped.
///
/// Writes run one at a time. A scene published just before the engine is
/// dropped is still written before this returns.
pub async fn run_scene_export(mut rx: watch::Receiver<Arc<SceneSnapshot>>, path: PathBuf) {
    info!(path = %path.display(), "Starting scene export");

    while rx.changed().await.is_ok() {
        let scene = rx.borrow_and_update().clone();
        let version = scene.version;
        let target = path.clone();

        match tokio::task::spawn_blocking(move || save_scene(&scene, &target)).await {
            Ok(Ok(())) => debug!(version = version, "Scene exported"),
            Ok(Err(e)) => error!(version = version, error = %e, "Failed to export scene"),
            Err(e) => error!(error = %e, "Scene export task failed"),
        }
    }

    debug!("Scene channel closed, export stopped");
}
