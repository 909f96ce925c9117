use super::*;
use crate::config::EngineConfig;
use crate::health::HealthStatus;
use crate::layout::{OverflowPolicy, PlacementArea};
use crate::poll::{AgentRecord, AgentStatus, EventRecord, OfficeRecord, OfficeType, PollPayload};
use crate::scene::SceneTrigger;
use crate::source::PollSource;
use crate::template::{OfficeTemplate, Rect, Room, TemplateSet};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn templates() -> Arc<TemplateSet> {
    let mut set = TemplateSet::new();
    set.insert(
        "hq",
        OfficeTemplate::new(vec![Room::new("floor", Rect::new(0, 0, 4, 2))], vec![]).unwrap(),
    )
    .unwrap();
    set.set_fallback(
        OfficeTemplate::new(vec![Room::new("room", Rect::new(0, 0, 2, 1))], vec![]).unwrap(),
    );
    Arc::new(set)
}

fn engine_with(pulse_ttl_ms: u64) -> SceneEngine {
    let config = EngineConfig {
        pulse_ttl_ms,
        ..EngineConfig::default()
    };
    SceneEngine::new(templates(), &config)
}

fn agent(id: &str, office: &str, working: bool, unread: bool) -> AgentRecord {
    AgentRecord {
        id: id.to_string(),
        office_id: Some(office.to_string()),
        working,
        unread,
    }
}

fn office(id: &str, kind: OfficeType, parent: Option<&str>) -> OfficeRecord {
    OfficeRecord {
        id: id.to_string(),
        name: id.to_uppercase(),
        kind,
        parent_id: parent.map(str::to_string),
        ..OfficeRecord::default()
    }
}

fn event(agent_id: &str, direction: &str, timestamp: i64) -> EventRecord {
    EventRecord {
        agent_id: agent_id.to_string(),
        direction: direction.to_string(),
        timestamp,
    }
}

fn hq_payload(agent_ids: &[&str]) -> PollPayload {
    PollPayload {
        agents: agent_ids
            .iter()
            .map(|id| agent(id, "hq", false, false))
            .collect(),
        offices: vec![office("hq", OfficeType::Main, None)],
        events: vec![],
    }
}

#[test]
fn test_identical_polls_keep_layout() {
    let mut engine = engine_with(5_000);

    let first = engine.apply_payload(hq_payload(&["a", "b"]), 0);
    let second = engine.apply_payload(hq_payload(&["b", "a"]), 3_000);

    // Same roster: same Arc, no recomputation
    assert!(Arc::ptr_eq(
        &first.offices["hq"].layout,
        &second.offices["hq"].layout
    ));
    assert_eq!(second.version, 2);
    assert_eq!(engine.metrics.get_snapshot().layouts_computed, 1);
}

#[test]
fn test_status_change_does_not_move_agents() {
    let mut engine = engine_with(5_000);
    let before = engine.apply_payload(hq_payload(&["a", "b"]), 0);

    let mut payload = hq_payload(&["a", "b"]);
    payload.agents[0].working = true;
    let after = engine.apply_payload(payload, 3_000);

    assert_eq!(
        before.agent("a").unwrap().placement,
        after.agent("a").unwrap().placement
    );
    assert_eq!(after.agent("a").unwrap().status, AgentStatus::new(true, false));
    assert!(Arc::ptr_eq(
        &before.offices["hq"].layout,
        &after.offices["hq"].layout
    ));
}

#[test]
fn test_roster_change_reverts_to_original_layout() {
    let mut engine = engine_with(5_000);

    let original = engine.apply_payload(hq_payload(&["a", "b"]), 0);
    let grown = engine.apply_payload(hq_payload(&["a", "b", "x"]), 3_000);
    let reverted = engine.apply_payload(hq_payload(&["a", "b"]), 6_000);

    assert!(grown.agent("x").is_some());
    assert_eq!(grown.offices["hq"].layout.members().len(), 3);
    assert_eq!(
        *original.offices["hq"].layout,
        *reverted.offices["hq"].layout
    );
    assert!(reverted.agent("x").is_none());
}

#[test]
fn test_dirty_sets_in_updates() {
    let mut engine = engine_with(5_000);
    let mut updates = engine.subscribe();

    engine.apply_payload(hq_payload(&["a"]), 0);
    let first = updates.try_recv().unwrap();
    assert_eq!(first.trigger, SceneTrigger::Poll);
    assert_eq!(first.dirty_agents, vec!["a".to_string()]);
    assert_eq!(first.dirty_offices, vec!["hq".to_string()]);

    // Unchanged poll still composes, with nothing dirty
    engine.apply_payload(hq_payload(&["a"]), 3_000);
    let second = updates.try_recv().unwrap();
    assert_eq!(second.version, 2);
    assert!(second.dirty_agents.is_empty());
    assert!(second.dirty_offices.is_empty());
}

#[test]
fn test_failed_poll_holds_last_scene() {
    let mut engine = engine_with(5_000);
    let scene = engine.apply_payload(hq_payload(&["a", "b"]), 0);

    // No poll applied: decay with nothing to expire composes nothing
    assert!(engine.decay(3_000).is_none());
    assert_eq!(engine.version(), 1);
    assert!(Arc::ptr_eq(&engine.current(), &scene));
}

#[test]
fn test_pulse_expiry_through_decay() {
    let mut engine = engine_with(4_000);

    let mut payload = hq_payload(&["a"]);
    payload.events.push(event("a", "send", 1_000));
    let scene = engine.apply_payload(payload, 1_000);
    assert!(scene.agent("a").unwrap().pulse.is_some());

    // Still showing at 3.9 s
    assert!(engine.decay(4_900).is_none());
    assert!(engine.current().agent("a").unwrap().pulse.is_some());

    // Gone at 4.1 s
    let decayed = engine.decay(5_100).unwrap();
    assert_eq!(decayed.trigger, SceneTrigger::Decay);
    assert!(decayed.agent("a").unwrap().pulse.is_none());
}

#[test]
fn test_repolled_event_does_not_revive_pulse() {
    let mut engine = engine_with(4_000);

    let mut payload = hq_payload(&["a"]);
    payload.events.push(event("a", "send", 1_000));
    engine.apply_payload(payload.clone(), 1_000);
    engine.decay(6_000).unwrap();

    let scene = engine.apply_payload(payload, 7_000);
    assert!(scene.agent("a").unwrap().pulse.is_none());
    assert_eq!(engine.metrics.get_snapshot().events_accepted, 1);
}

#[test]
fn test_last_timestamp_wins_within_poll() {
    let mut engine = engine_with(5_000);

    let mut payload = hq_payload(&["a"]);
    payload.events.push(event("a", "send", 2_000));
    payload.events.push(event("a", "receive", 1_500));
    let scene = engine.apply_payload(payload, 2_000);

    let pulse = scene.agent("a").unwrap().pulse.clone().unwrap();
    assert_eq!(pulse.timestamp, 2_000);
    assert_eq!(pulse.expires_at, 7_000);
}

#[test]
fn test_event_for_unknown_agent_dropped() {
    let mut engine = engine_with(5_000);

    let mut payload = hq_payload(&["a"]);
    payload.events.push(event("ghost", "send", 1_000));
    let scene = engine.apply_payload(payload, 1_000);

    assert!(scene.agent("ghost").is_none());
    assert_eq!(engine.metrics.get_snapshot().events_dropped, 1);
}

#[test]
fn test_removed_agent_loses_pulse() {
    let mut engine = engine_with(5_000);

    let mut payload = hq_payload(&["a", "b"]);
    payload.events.push(event("b", "receive", 1_000));
    engine.apply_payload(payload, 1_000);

    let scene = engine.apply_payload(hq_payload(&["a"]), 2_000);
    assert!(scene.agent("b").is_none());
    // Nothing left to expire
    assert!(engine.decay(10_000).is_none());
}

#[test]
fn test_office_without_template_omitted() {
    let config = EngineConfig::default();
    let mut set = TemplateSet::new();
    set.insert(
        "hq",
        OfficeTemplate::new(vec![Room::new("floor", Rect::new(0, 0, 4, 2))], vec![]).unwrap(),
    )
    .unwrap();
    let mut engine = SceneEngine::new(Arc::new(set), &config);

    let payload = PollPayload {
        agents: vec![agent("a", "hq", false, false), agent("b", "lab", false, false)],
        offices: vec![
            office("hq", OfficeType::Main, None),
            office("lab", OfficeType::Independent, None),
        ],
        events: vec![],
    };
    let scene = engine.apply_payload(payload, 0);

    assert!(scene.office("hq").is_some());
    assert!(scene.office("lab").is_none());
    assert!(engine.layout("lab").is_none());
    // Health is still computed for the omitted office
    assert_eq!(engine.health().get("lab").unwrap().own.total, 1);
}

#[test]
fn test_fallback_template_used_for_other_offices() {
    let mut engine = engine_with(5_000);

    let payload = PollPayload {
        agents: vec![agent("a", "lab", false, false)],
        offices: vec![office("lab", OfficeType::Independent, None)],
        events: vec![],
    };
    let scene = engine.apply_payload(payload, 0);

    assert_eq!(
        scene.agent("a").unwrap().placement.as_ref().unwrap().area,
        PlacementArea::Room("room".to_string())
    );
}

#[test]
fn test_hierarchy_rollup() {
    let mut engine = engine_with(5_000);

    let payload = PollPayload {
        agents: vec![
            agent("a", "s1", true, false),
            agent("b", "s1", true, false),
            agent("c", "s2", false, false),
        ],
        offices: vec![
            office("m", OfficeType::Main, None),
            office("s1", OfficeType::Sub, Some("m")),
            office("s2", OfficeType::Sub, Some("m")),
        ],
        events: vec![],
    };
    let scene = engine.apply_payload(payload, 0);

    let m = scene.office("m").unwrap().health.unwrap();
    assert_eq!(m.own.total, 0);
    assert_eq!(m.rolled_up.total, 3);
    assert_eq!(m.rolled_up.working, 2);
    assert_eq!(m.status, HealthStatus::Working);
}

#[test]
fn test_cycle_isolated_from_other_trees() {
    let mut engine = engine_with(5_000);

    let payload = PollPayload {
        agents: vec![agent("a", "x", false, false), agent("b", "hq", false, true)],
        offices: vec![
            office("hq", OfficeType::Main, None),
            office("x", OfficeType::Sub, Some("y")),
            office("y", OfficeType::Sub, Some("x")),
        ],
        events: vec![],
    };
    let scene = engine.apply_payload(payload, 0);

    assert_eq!(engine.health().malformed.len(), 1);
    assert!(scene.office("x").unwrap().health.is_none());
    assert_eq!(
        scene.office("hq").unwrap().health.unwrap().status,
        HealthStatus::NeedsAttention
    );
}

#[test]
fn test_health_change_marks_office_dirty() {
    let mut engine = engine_with(5_000);
    let mut updates = engine.subscribe();

    let payload = |working| PollPayload {
        agents: vec![agent("a", "s1", working, false)],
        offices: vec![
            office("m", OfficeType::Main, None),
            office("s1", OfficeType::Sub, Some("m")),
        ],
        events: vec![],
    };
    engine.apply_payload(payload(false), 0);
    engine.apply_payload(payload(true), 3_000);

    let _ = updates.try_recv().unwrap();
    let second = updates.try_recv().unwrap();
    // Parent is dirty through its rolled-up health
    assert_eq!(second.dirty_offices, vec!["m".to_string(), "s1".to_string()]);
}

#[test]
fn test_capacity_report_policy() {
    let config = EngineConfig {
        overflow_policy: OverflowPolicy::Report,
        ..EngineConfig::default()
    };
    let mut engine = SceneEngine::new(templates(), &config);

    let payload = PollPayload {
        agents: vec![
            agent("a", "lab", false, false),
            agent("b", "lab", false, false),
            agent("c", "lab", false, false),
        ],
        offices: vec![office("lab", OfficeType::Independent, None)],
        events: vec![],
    };
    let scene = engine.apply_payload(payload, 0);

    let lab = scene.office("lab").unwrap();
    assert_eq!(lab.agents.len(), 3);
    assert!(lab.agents["c"].placement.is_none());
    let report = lab.layout.capacity.as_ref().unwrap();
    assert_eq!(report.capacity, 2);
    assert_eq!(report.requested, 3);
}

#[test]
fn test_removed_office_dropped_from_scene() {
    let mut engine = engine_with(5_000);

    let mut payload = hq_payload(&["a"]);
    payload.offices.push(office("lab", OfficeType::Independent, None));
    let scene = engine.apply_payload(payload, 0);
    assert!(scene.office("lab").is_some());

    let scene = engine.apply_payload(hq_payload(&["a"]), 3_000);
    assert!(scene.office("lab").is_none());
    assert!(engine.layout("lab").is_none());
}

#[tokio::test]
async fn test_watch_sees_latest_scene() {
    let mut engine = engine_with(5_000);
    let mut rx = engine.watch();
    assert_eq!(rx.borrow().version, 0);

    engine.apply_payload(hq_payload(&["a"]), 0);

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().version, 1);
    assert!(rx.borrow().agent("a").is_some());
}

struct CountingSource {
    fetches: AtomicUsize,
    fail_after: usize,
}

#[async_trait]
impl PollSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self) -> anyhow::Result<PollPayload> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_after {
            anyhow::bail!("source unavailable");
        }
        Ok(hq_payload(&["a", "b"]))
    }
}

#[tokio::test]
async fn test_run_applies_polls_until_shutdown() {
    let config = EngineConfig {
        poll_interval_ms: 10,
        decay_interval_ms: 5,
        ..EngineConfig::default()
    };
    let engine = SceneEngine::new(templates(), &config);
    let mut rx = engine.watch();
    let source = Arc::new(CountingSource {
        fetches: AtomicUsize::new(0),
        fail_after: 2,
    });

    let shutdown = async move {
        // First composition arrives, then let a few failing polls happen
        let _ = rx.changed().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
    };
    let engine = run(engine, source.clone(), &config, shutdown)
        .await
        .unwrap();

    let metrics = engine.metrics.get_snapshot();
    assert_eq!(metrics.polls_applied, 2);
    assert!(metrics.polls_failed >= 1);

    // Last good scene is still published
    let scene = engine.current();
    assert_eq!(scene.agent_count(), 2);
    assert!(source.fetches.load(Ordering::SeqCst) > 2);
}
