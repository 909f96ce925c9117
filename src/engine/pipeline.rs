use crate::config::EngineConfig;
use crate::diff::diff;
use crate::engine::metrics::EngineMetrics;
use crate::health::{aggregate, HealthReport};
use crate::layout::{BuildingLayout, LayoutResolver};
use crate::office::OfficeId;
use crate::poll::{AgentId, PollPayload, Snapshot};
use crate::pulse::{Pulse, PulseTracker};
use crate::scene::{compose, ComposeInput, SceneSnapshot, SceneTrigger};
use crate::template::TemplateSet;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Notification sent after every composition
#[derive(Clone, Debug)]
pub struct SceneUpdate {
    pub version: u64,
    pub trigger: SceneTrigger,
    pub scene: Arc<SceneSnapshot>,
    /// Agents whose view changed since the previous scene
    pub dirty_agents: Vec<AgentId>,
    /// Offices whose record, roster or health changed
    pub dirty_offices: Vec<OfficeId>,
}

/// Keys whose value was added, removed or changed between two maps
fn changed_keys<K: Ord + Clone, V: PartialEq>(
    old: &BTreeMap<K, V>,
    new: &BTreeMap<K, V>,
) -> BTreeSet<K> {
    let mut keys: BTreeSet<K> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    keys.extend(new.keys().filter(|k| !old.contains_key(*k)).cloned());
    keys
}

/// Single-writer update pipeline.
///
/// Owns every piece of mutable engine state. Poll passes and decay ticks
/// both end in one composition, published as a fresh `Arc<SceneSnapshot>`;
/// readers only ever hold immutable scenes.
pub struct SceneEngine {
    resolver: LayoutResolver,
    pulses: PulseTracker,

    /// Last good snapshot; held when polls are skipped or fail
    snapshot: Snapshot,

    layouts: BTreeMap<OfficeId, Arc<BuildingLayout>>,
    active_pulses: BTreeMap<AgentId, Pulse>,
    health: HealthReport,
    version: u64,

    /// Latest scene for readers
    scene_tx: watch::Sender<Arc<SceneSnapshot>>,

    /// Broadcast channel for scene update notifications
    update_tx: broadcast::Sender<SceneUpdate>,

    pub metrics: EngineMetrics,
}

impl SceneEngine {
    pub fn new(templates: Arc<TemplateSet>, config: &EngineConfig) -> Self {
        let (scene_tx, _) = watch::channel(Arc::new(SceneSnapshot::empty()));
        let (update_tx, _) = broadcast::channel(64);

        Self {
            resolver: LayoutResolver::new(templates, config.overflow_policy),
            pulses: PulseTracker::new(config.pulse_ttl()),
            snapshot: Snapshot::empty(),
            layouts: BTreeMap::new(),
            active_pulses: BTreeMap::new(),
            health: HealthReport::default(),
            version: 0,
            scene_tx,
            update_tx,
            metrics: EngineMetrics::new(),
        }
    }

    /// Normalize a raw payload and run a poll pass
    pub fn apply_payload(&mut self, payload: PollPayload, now: i64) -> Arc<SceneSnapshot> {
        self.apply_poll(Snapshot::from_payload(payload), now)
    }

    /// Run one poll pass: diff, re-resolve changed rosters, ingest events,
    /// aggregate health and compose.
    pub fn apply_poll(&mut self, snapshot: Snapshot, now: i64) -> Arc<SceneSnapshot> {
        let delta = diff(&self.snapshot, &snapshot);
        if !delta.is_empty() {
            debug!(changes = %delta.summary(), "Poll changed state");
        }

        // Forget offices that are no longer polled
        self.layouts.retain(|office_id, _| snapshot.offices.contains(office_id));
        self.resolver.retain(snapshot.offices.ids());

        // Only roster changes (and new offices) invalidate layouts
        let rosters = snapshot.rosters();
        let mut invalidated = delta.roster_changes();
        invalidated.extend(delta.offices_added.iter().cloned());

        for office_id in invalidated {
            let Some(roster) = rosters.get(&office_id) else {
                continue;
            };
            match self.resolver.resolve(&office_id, roster) {
                Ok(layout) => {
                    if let Some(report) = &layout.capacity {
                        warn!(
                            office_id = %office_id,
                            capacity = report.capacity,
                            requested = report.requested,
                            policy = ?self.resolver.policy(),
                            "Office capacity exceeded"
                        );
                    }
                    self.layouts.insert(office_id, layout);
                }
                Err(e) => {
                    warn!(office_id = %office_id, error = %e, "Office omitted from scene");
                    self.layouts.remove(&office_id);
                }
            }
        }

        let dropped = self.pulses.set_roster(snapshot.agents.keys().cloned());
        if dropped > 0 {
            debug!(dropped = dropped, "Dropped pulses of removed agents");
        }
        for event in &snapshot.events {
            let outcome = self.pulses.ingest(event);
            self.metrics.record_ingest(outcome);
        }
        let pulse_changes = self.refresh_pulses(now);

        let health = aggregate(&snapshot.offices, &snapshot.agents);
        if health.malformed != self.health.malformed {
            for err in &health.malformed {
                warn!(error = %err, "Health aggregation skipped for malformed office tree");
            }
        }

        let mut dirty_agents = delta.dirty_agents();
        dirty_agents.extend(pulse_changes.iter().cloned());

        let mut dirty_offices = delta.dirty_offices();
        dirty_offices.extend(changed_keys(&self.health.by_office, &health.by_office));
        dirty_offices.extend(self.offices_of(&pulse_changes, &snapshot));

        self.health = health;
        self.snapshot = snapshot;

        self.metrics.record_poll();
        let stats = self.resolver.stats();
        self.metrics.set_layout_totals(stats.computed, stats.reused);

        self.publish(SceneTrigger::Poll, now, dirty_agents, dirty_offices)
    }

    /// Expire pulses. Composes only when the set of active pulses changed.
    pub fn decay(&mut self, now: i64) -> Option<Arc<SceneSnapshot>> {
        let changed = self.refresh_pulses(now);
        if changed.is_empty() {
            return None;
        }

        let offices = self.offices_of(&changed, &self.snapshot);
        Some(self.publish(SceneTrigger::Decay, now, changed, offices))
    }

    /// Tick the pulse tracker and return agents whose pulse changed
    fn refresh_pulses(&mut self, now: i64) -> BTreeSet<AgentId> {
        let active: BTreeMap<AgentId, Pulse> = self
            .pulses
            .tick(now)
            .into_iter()
            .map(|pulse| (pulse.agent_id.clone(), pulse))
            .collect();
        let changed = changed_keys(&self.active_pulses, &active);
        self.active_pulses = active;
        changed
    }

    fn offices_of(&self, agents: &BTreeSet<AgentId>, snapshot: &Snapshot) -> BTreeSet<OfficeId> {
        agents
            .iter()
            .filter_map(|id| snapshot.agents.get(id))
            .map(|state| state.office_id.clone())
            .collect()
    }

    fn publish(
        &mut self,
        trigger: SceneTrigger,
        now: i64,
        dirty_agents: BTreeSet<AgentId>,
        dirty_offices: BTreeSet<OfficeId>,
    ) -> Arc<SceneSnapshot> {
        self.version += 1;

        let statuses = self.snapshot.status_by_agent();
        let scene = Arc::new(compose(&ComposeInput {
            version: self.version,
            composed_at: now,
            trigger,
            offices: &self.snapshot.offices,
            layouts: &self.layouts,
            statuses: &statuses,
            pulses: &self.active_pulses,
            health: &self.health.by_office,
        }));

        self.scene_tx.send_replace(Arc::clone(&scene));

        // No subscribers is fine
        let _ = self.update_tx.send(SceneUpdate {
            version: self.version,
            trigger,
            scene: Arc::clone(&scene),
            dirty_agents: dirty_agents.into_iter().collect(),
            dirty_offices: dirty_offices.into_iter().collect(),
        });

        self.metrics.record_composition();
        scene
    }

    /// Latest composed scene
    pub fn current(&self) -> Arc<SceneSnapshot> {
        self.scene_tx.borrow().clone()
    }

    /// Read handle on the latest scene, usable from other tasks
    pub fn watch(&self) -> watch::Receiver<Arc<SceneSnapshot>> {
        self.scene_tx.subscribe()
    }

    /// Subscribe to scene update notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SceneUpdate> {
        self.update_tx.subscribe()
    }

    pub fn layout(&self, office_id: &str) -> Option<&Arc<BuildingLayout>> {
        self.layouts.get(office_id)
    }

    pub fn health(&self) -> &HealthReport {
        &self.health
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
