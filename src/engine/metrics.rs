use crate::pulse::IngestOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Counters for the update pipeline.
///
/// Cheap to clone; clones share the same counters so the poll task and the
/// reporter can observe what the engine records.
#[derive(Clone, Default)]
pub struct EngineMetrics {
    polls_applied: Arc<AtomicU64>,
    polls_failed: Arc<AtomicU64>,
    compositions: Arc<AtomicU64>,
    events_accepted: Arc<AtomicU64>,
    events_dropped: Arc<AtomicU64>,
    layouts_computed: Arc<AtomicU64>,
    layouts_reused: Arc<AtomicU64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll(&self) {
        self.polls_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_failure(&self) {
        self.polls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_composition(&self) {
        self.compositions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an ingested event. Stale re-deliveries are not counted.
    pub fn record_ingest(&self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Created | IngestOutcome::Replaced => {
                self.events_accepted.fetch_add(1, Ordering::Relaxed);
            }
            IngestOutcome::UnknownAgent => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
            IngestOutcome::Stale => {}
        }
    }

    /// Store the resolver's running totals
    pub fn set_layout_totals(&self, computed: u64, reused: u64) {
        self.layouts_computed.store(computed, Ordering::Relaxed);
        self.layouts_reused.store(reused, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls_applied: self.polls_applied.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            compositions: self.compositions.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            layouts_computed: self.layouts_computed.load(Ordering::Relaxed),
            layouts_reused: self.layouts_reused.load(Ordering::Relaxed),
        }
    }
}

/// Metrics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub polls_applied: u64,
    pub polls_failed: u64,
    pub compositions: u64,
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub layouts_computed: u64,
    pub layouts_reused: u64,
}

/// Periodically log engine metrics.
///
/// Runs until the task is cancelled.
pub async fn run_metrics_reporter(metrics: EngineMetrics, interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let snapshot = metrics.get_snapshot();
        info!(
            polls_applied = snapshot.polls_applied,
            polls_failed = snapshot.polls_failed,
            compositions = snapshot.compositions,
            events_accepted = snapshot.events_accepted,
            events_dropped = snapshot.events_dropped,
            layouts_computed = snapshot.layouts_computed,
            layouts_reused = snapshot.layouts_reused,
            "Engine metrics"
        );
    }
}
