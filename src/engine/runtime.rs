use super::metrics::EngineMetrics;
use super::{now_millis, SceneEngine};
use crate::config::EngineConfig;
use crate::poll::PollPayload;
use crate::source::PollSource;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Start the poll loop (non-blocking).
///
/// Each successful fetch is forwarded whole; a failed fetch sends nothing
/// so the engine keeps its last good snapshot.
fn spawn_poller(
    source: Arc<dyn PollSource>,
    poll_interval: Duration,
    metrics: EngineMetrics,
    tx: mpsc::Sender<PollPayload>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match source.fetch().await {
                Ok(payload) => {
                    debug!(
                        agents = payload.agents.len(),
                        offices = payload.offices.len(),
                        events = payload.events.len(),
                        "Poll fetched"
                    );
                    if tx.send(payload).await.is_err() {
                        // Engine stopped
                        break;
                    }
                }
                Err(e) => {
                    metrics.record_poll_failure();
                    warn!(error = %e, "Poll failed, keeping last snapshot");
                }
            }
        }
    })
}

/// Drive the engine until `shutdown` resolves.
///
/// Polls and decay ticks are serialized here, so the engine needs no
/// locking. Returns the engine so callers can inspect its final state.
pub async fn run<F>(
    mut engine: SceneEngine,
    source: Arc<dyn PollSource>,
    config: &EngineConfig,
    shutdown: F,
) -> Result<SceneEngine>
where
    F: Future<Output = ()>,
{
    info!(
        poll_interval_ms = config.poll_interval_ms,
        decay_interval_ms = config.decay_interval_ms,
        pulse_ttl_ms = config.pulse_ttl_ms,
        "Starting scene engine"
    );

    // Capacity 1: a slow engine makes the poller wait instead of queueing
    let (tx, mut rx) = mpsc::channel(1);
    let poller = spawn_poller(source, config.poll_interval(), engine.metrics.clone(), tx);

    let mut decay = interval(config.decay_interval());
    decay.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scene engine");
                break;
            }

            payload = rx.recv() => {
                match payload {
                    Some(payload) => {
                        let scene = engine.apply_payload(payload, now_millis());
                        debug!(
                            version = scene.version,
                            offices = scene.offices.len(),
                            agents = scene.agent_count(),
                            "Scene composed"
                        );
                    }
                    None => {
                        warn!("Poller stopped unexpectedly");
                        break;
                    }
                }
            }

            _ = decay.tick() => {
                if let Some(scene) = engine.decay(now_millis()) {
                    debug!(version = scene.version, "Pulses expired");
                }
            }
        }
    }

    poller.abort();
    Ok(engine)
}
