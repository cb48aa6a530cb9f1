//! End-to-end worker scenarios against fake agents
//!
//! These tests verify that:
//! - Transitions append events and close the previous interval
//! - Adverse results are re-verified through a second agent
//! - Verification overwrites availability only
//! - Alerts are emitted and throttled per monitor
//! - Failed probes skip the monitor without touching `updated_at`

use std::sync::Arc;

use chrono::{Duration, Utc};
use lookout::actors::messages::{SkipReason, WorkerOutcome};
use lookout::actors::worker::MonitorWorker;
use lookout::pool::AgentPool;
use lookout::probe::ProbeClient;
use lookout::storage::{MemoryStore, UptimeStore};
use lookout::{Availability, MonitorKind, PortState, Reachability};
use serde_json::json;

use crate::helpers::{
    agent_body_down, agent_body_up, start_agent, start_broken_agent, test_event, test_monitor,
};

fn worker(store: Arc<MemoryStore>, pool: Arc<AgentPool>) -> MonitorWorker {
    MonitorWorker::new(store, pool, ProbeClient::new("test-token".to_string()))
}

#[tokio::test]
async fn test_down_transition_with_verification() {
    // S1: prior state Up, both agents observe Down.
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_down("500")).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(1);
    let prior_id = store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, true))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: true,
        }
    );

    // New event: authoritative Down, non-authoritative fields adverse
    // because the agent omitted them, reason copied from the agent, and
    // the verifier recorded as the confirming agent.
    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.availability, Availability::Down);
    assert_eq!(latest.ping, Reachability::Unreachable);
    assert_eq!(latest.port_state, PortState::Closed);
    assert_eq!(latest.reason.as_deref(), Some("500"));
    assert_eq!(latest.confirmed_by_agent, a2.uri());
    assert!(latest.end_time.is_none());

    // Prior event closed at the new event's timestamp.
    let events = store
        .events_since("m1", t0 - Duration::seconds(1))
        .await
        .unwrap();
    let prior = events.iter().find(|e| e.id == prior_id).unwrap();
    assert_eq!(prior.end_time, Some(latest.timestamp));

    // Alert enqueued, monitor bookkeeping updated.
    let alerts = store.alerts_for_user("u1").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].monitor_id, "m1");
    assert_eq!(alerts[0].url, "http://ex.com");
    assert_eq!(alerts[0].tries, 0);
    assert_eq!(alerts[0].max_tries, 3);

    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert_eq!(row.last_alert_sent_at, Some(latest.timestamp));
    assert_eq!(row.updated_at, latest.timestamp);
}

#[tokio::test]
async fn test_verification_overturns_primary() {
    // S2: primary says Down, verifier says Up, prior state Up.
    let a1 = start_agent(agent_body_down("503")).await;
    let a2 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(1);
    let prior_id = store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, true))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: false,
            alerted: false,
        }
    );

    // State unchanged: no append, the prior interval stays open.
    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.id, prior_id);
    assert!(latest.end_time.is_none());

    assert!(store.alerts_for_user("u1").await.unwrap().is_empty());

    // updated_at still bumped.
    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert!(row.updated_at > monitor.updated_at);
}

#[tokio::test]
async fn test_verification_overwrites_availability_only() {
    // Prior state Down; the primary observes Down (with adverse defaults
    // for the omitted fields) and the verifier overturns to Up. The
    // appended event carries the verifier's availability but keeps the
    // primary's other fields.
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(1);
    store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, false))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: false,
        }
    );

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.availability, Availability::Up);
    assert_eq!(latest.ping, Reachability::Unreachable);
    assert_eq!(latest.port_state, PortState::Closed);
    assert_eq!(latest.confirmed_by_agent, a2.uri());
}

#[tokio::test]
async fn test_ping_monitor_verification_keeps_authoritative_field() {
    // For a ping monitor the verifier still only rewrites availability,
    // so the authoritative (ping) field stays adverse and the alert fires
    // even though availability was overturned.
    let a1 = start_agent(json!({
        "availability": "Down",
        "ping": "Unreachable",
        "data": { "output": "100% packet loss" }
    }))
    .await;
    let a2 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Ping, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: true,
        }
    );

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.availability, Availability::Up);
    assert_eq!(latest.ping, Reachability::Unreachable);
    assert_eq!(latest.reason.as_deref(), Some("100% packet loss"));
    assert_eq!(latest.confirmed_by_agent, a2.uri());
}

#[tokio::test]
async fn test_both_agents_failing_skips_the_monitor() {
    // S3: primary and alternate both error out.
    let a1 = start_broken_agent().await;
    let a2 = start_broken_agent().await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Skipped(SkipReason::BothAgentsFailed)
    );

    // No event, no alert, updated_at untouched: the next tick retries.
    assert!(store.latest_event("m1").await.unwrap().is_none());
    assert!(store.alerts_for_user("u1").await.unwrap().is_empty());

    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert_eq!(row.updated_at, monitor.updated_at);
}

#[tokio::test]
async fn test_empty_pool_skips_the_monitor() {
    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::empty());
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(outcome, WorkerOutcome::Skipped(SkipReason::NoAgents));

    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert_eq!(row.updated_at, monitor.updated_at);
}

#[tokio::test]
async fn test_alert_throttled_within_window() {
    // S4: alert_frequency 5 min, last alert 2 min ago, still Down.
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_down("500")).await;

    let store = Arc::new(MemoryStore::new());
    let mut monitor = test_monitor("m1", MonitorKind::Web, 1);
    monitor.alert_frequency = 5;
    monitor.last_alert_sent_at = Some(Utc::now() - Duration::minutes(2));
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(2);
    store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, false))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;

    // Down -> Down: no transition; adverse but throttled: no alert.
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: false,
            alerted: false,
        }
    );

    assert!(store.alerts_for_user("u1").await.unwrap().is_empty());

    // Throttle bookkeeping untouched when nothing was emitted.
    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert_eq!(row.last_alert_sent_at, monitor.last_alert_sent_at);
}

#[tokio::test]
async fn test_transition_appends_even_when_alert_is_throttled() {
    // S4 variant: prior state Up; the Down transition is recorded, but
    // the alert stays throttled.
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_down("500")).await;

    let store = Arc::new(MemoryStore::new());
    let mut monitor = test_monitor("m1", MonitorKind::Web, 1);
    monitor.alert_frequency = 5;
    monitor.last_alert_sent_at = Some(Utc::now() - Duration::minutes(2));
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(2);
    store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, true))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: false,
        }
    );

    assert!(store.alerts_for_user("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_observation_appends_without_alert() {
    let a1 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: false,
        }
    );

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.availability, Availability::Up);
    assert!(latest.end_time.is_none());
    assert_eq!(latest.confirmed_by_agent, a1.uri());
}

#[tokio::test]
async fn test_repeated_adverse_probes_append_once() {
    // Two sequential Down observations yield exactly one Down event.
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_down("500")).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let first = worker.run_monitor(&monitor).await;
    assert_eq!(
        first,
        WorkerOutcome::Completed {
            appended: true,
            alerted: true,
        }
    );

    // The next tick sees the refreshed monitor row.
    let refreshed = store.get_monitor("m1").await.unwrap().unwrap();
    let second = worker.run_monitor(&refreshed).await;
    assert_eq!(
        second,
        WorkerOutcome::Completed {
            appended: false,
            alerted: false, // throttled: alert_frequency is 1 minute
        }
    );

    let events = store
        .events_since("m1", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_ownerless_monitor_never_alerts() {
    let a1 = start_agent(agent_body_down("500")).await;
    let a2 = start_agent(agent_body_down("500")).await;

    let store = Arc::new(MemoryStore::new());
    let mut monitor = test_monitor("m1", MonitorKind::Web, 1);
    monitor.user_id = None;
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: false,
        }
    );

    let row = store.get_monitor("m1").await.unwrap().unwrap();
    assert!(row.last_alert_sent_at.is_none());
}

#[tokio::test]
async fn test_adverse_result_stands_without_verifier() {
    // A single registered agent: adverse results cannot be verified, the
    // candidate stands and the alert fires.
    let a1 = start_agent(agent_body_down("502")).await;

    let store = Arc::new(MemoryStore::new());
    let monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: true,
        }
    );

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.availability, Availability::Down);
    assert_eq!(latest.confirmed_by_agent, a1.uri());
}

#[tokio::test]
async fn test_kind_change_records_fresh_transition() {
    // The prior event was recorded while the monitor was `web`; after a
    // kind change to `port` the first probe appends regardless.
    let a1 = start_agent(json!({
        "availability": "Up",
        "port": "Open",
        "data": { "output": "connected" }
    }))
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut monitor = test_monitor("m1", MonitorKind::Web, 1);
    store.insert_monitor(&monitor).await.unwrap();

    let t0 = Utc::now() - Duration::minutes(1);
    store
        .insert_event(&test_event("m1", MonitorKind::Web, t0, true))
        .await
        .unwrap();

    monitor.kind = MonitorKind::Port;

    let pool = Arc::new(AgentPool::new(vec![a1.uri()]));
    let worker = worker(store.clone(), pool);

    let outcome = worker.run_monitor(&monitor).await;
    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            appended: true,
            alerted: false,
        }
    );

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.kind, MonitorKind::Port);
    assert_eq!(latest.port_state, PortState::Open);
}
