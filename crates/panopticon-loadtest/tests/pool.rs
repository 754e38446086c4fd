//! Session pool lifecycle against an in-process task store

mod common;

use std::time::Duration;

use common::{InMemoryClient, TaskStore};
use panopticon_loadtest::prelude::*;

fn config(users: usize, run_time_secs: u64) -> LoadTestConfig {
    LoadTestConfig {
        target_url: "http://in-memory".to_string(),
        users,
        spawn_rate: 2.0,
        run_time_secs: Some(run_time_secs),
        seed: Some(1234),
        session: SessionConfig {
            min_wait_secs: 0.5,
            max_wait_secs: 1.5,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_pool_runs_all_sessions_until_run_time() {
    let store = TaskStore::new();
    let pool = SessionPool::new(config(8, 60)).unwrap();

    let started = tokio::time::Instant::now();
    let report = pool
        .run(
            |_| InMemoryClient::new(store.clone()),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
    assert_eq!(report.sessions.len(), 8);
    assert_eq!(pool.metrics().active_sessions(), 0);

    let mut ids: Vec<_> = report.sessions.iter().map(|s| s.session_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());

    // Counters agree with what the sessions saw
    let executed: u64 = report.sessions.iter().map(|s| s.executed).sum();
    let skipped: u64 = report.sessions.iter().map(|s| s.skipped).sum();
    assert_eq!(report.summary.total_requests, executed);
    assert_eq!(report.summary.skipped_turns, skipped);
    assert!(executed > 100);

    // Sessions only delete their own tasks, so every surviving task is
    // still held by exactly one session
    let outstanding: usize = report.sessions.iter().map(|s| s.outstanding_ids).sum();
    assert_eq!(store.len(), outstanding);
    assert_eq!(report.summary.failed_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_future_ends_run_early() {
    let store = TaskStore::new();
    let pool = SessionPool::new(config(4, 3_600)).unwrap();

    let started = tokio::time::Instant::now();
    let report = pool
        .run(
            |_| InMemoryClient::new(store.clone()),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(report.sessions.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_ramp_up_respects_spawn_rate() {
    let store = TaskStore::new();
    // 2 sessions/s: after 2.2s only sessions spawned at 0, 0.5, 1.0, 1.5, 2.0 exist
    let pool = SessionPool::new(config(20, 60)).unwrap();
    let metrics = pool.metrics();

    let report = pool
        .run(
            |_| InMemoryClient::new(store.clone()),
            tokio::time::sleep(Duration::from_millis(2_200)),
        )
        .await
        .unwrap();

    assert_eq!(report.sessions.len(), 5);
    assert_eq!(metrics.active_sessions(), 0);
}

#[tokio::test]
async fn test_invalid_session_config_rejected_before_start() {
    let mut config = config(2, 1);
    config.session.weights.create = 0;

    match SessionPool::new(config) {
        Err(LoadTestError::Configuration(ConfigurationError::NonPositiveWeight { action, .. })) => {
            assert_eq!(action, "create");
        }
        other => panic!("expected weight error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_unusable_spawn_rate_rejected_before_start() {
    for spawn_rate in [1e10, 1e-20] {
        let config = LoadTestConfig {
            spawn_rate,
            ..config(2, 1)
        };
        assert!(matches!(
            SessionPool::new(config),
            Err(LoadTestError::Configuration(ConfigurationError::InvalidPool(_)))
        ));
    }
}

#[tokio::test]
async fn test_unrepresentable_think_time_rejected_before_start() {
    let mut config = config(2, 1);
    config.session.max_wait_secs = 1e20;

    assert!(matches!(
        SessionPool::new(config),
        Err(LoadTestError::Configuration(ConfigurationError::InvalidThinkTime { .. }))
    ));
}
