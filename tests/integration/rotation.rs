//! Round-robin dispatch and failover selection

use std::sync::Arc;

use lookout::actors::messages::WorkerOutcome;
use lookout::actors::worker::MonitorWorker;
use lookout::pool::AgentPool;
use lookout::probe::ProbeClient;
use lookout::storage::{MemoryStore, UptimeStore};
use lookout::MonitorKind;

use crate::helpers::{agent_body_up, start_agent, start_broken_agent, test_monitor};

fn worker(store: Arc<MemoryStore>, pool: Arc<AgentPool>) -> MonitorWorker {
    MonitorWorker::new(store, pool, ProbeClient::new("test-token".to_string()))
}

#[tokio::test]
async fn test_primaries_rotate_across_monitors() {
    // S5: three agents, three monitors in one page. Primary assignments
    // must be a rotation: one probe lands on each agent.
    let a1 = start_agent(agent_body_up()).await;
    let a2 = start_agent(agent_body_up()).await;
    let a3 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    for id in ["m1", "m2", "m3"] {
        store
            .insert_monitor(&test_monitor(id, MonitorKind::Web, 1))
            .await
            .unwrap();
    }

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri(), a3.uri()]));
    let worker = worker(store.clone(), pool);

    for id in ["m1", "m2", "m3"] {
        let monitor = store.get_monitor(id).await.unwrap().unwrap();
        let outcome = worker.run_monitor(&monitor).await;
        assert!(matches!(outcome, WorkerOutcome::Completed { .. }));
    }

    for agent in [&a1, &a2, &a3] {
        assert_eq!(agent.received_requests().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_failover_picks_a_different_agent() {
    // The first monitor's primary (a1) errors; its alternate must not be
    // a1 again.
    let a1 = start_broken_agent().await;
    let a2 = start_agent(agent_body_up()).await;
    let a3 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    store
        .insert_monitor(&test_monitor("m1", MonitorKind::Web, 1))
        .await
        .unwrap();

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri(), a3.uri()]));
    let worker = worker(store.clone(), pool);

    let monitor = store.get_monitor("m1").await.unwrap().unwrap();
    let outcome = worker.run_monitor(&monitor).await;
    assert!(matches!(
        outcome,
        WorkerOutcome::Completed { appended: true, .. }
    ));

    let latest = store.latest_event("m1").await.unwrap().unwrap();
    assert_eq!(latest.confirmed_by_agent, a2.uri());

    assert_eq!(a1.received_requests().await.unwrap().len(), 1);
    assert_eq!(a2.received_requests().await.unwrap().len(), 1);
    assert_eq!(a3.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_probe_count_bounded_per_sweep() {
    // With healthy agents and positive results, a sweep of N monitors
    // issues exactly N probes, comfortably within the 2N bound.
    let a1 = start_agent(agent_body_up()).await;
    let a2 = start_agent(agent_body_up()).await;

    let store = Arc::new(MemoryStore::new());
    for i in 0..6 {
        store
            .insert_monitor(&test_monitor(&format!("m{}", i), MonitorKind::Web, 1))
            .await
            .unwrap();
    }

    let pool = Arc::new(AgentPool::new(vec![a1.uri(), a2.uri()]));
    let worker = worker(store.clone(), pool);

    for i in 0..6 {
        let monitor = store.get_monitor(&format!("m{}", i)).await.unwrap().unwrap();
        worker.run_monitor(&monitor).await;
    }

    let total = a1.received_requests().await.unwrap().len()
        + a2.received_requests().await.unwrap().len();
    assert_eq!(total, 6);
    assert!(total <= 2 * 6);
}
