//! Run-wide counters
//!
//! Append-only atomics shared by every session. This is the only object
//! sessions touch in common, and none of them read it back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::action::{Action, ActionOutcome, Turn};

/// Per-action tallies
#[derive(Debug, Default)]
struct ActionCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    latency_us_total: AtomicU64,
}

impl ActionCounters {
    fn snapshot(&self) -> ActionStats {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let latency = self.latency_us_total.load(Ordering::Relaxed);
        ActionStats {
            attempts,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            mean_latency_us: if attempts > 0 { latency / attempts } else { 0 },
        }
    }
}

/// Load test counters
#[derive(Debug)]
pub struct LoadTestMetrics {
    list: ActionCounters,
    create: ActionCounters,
    update: ActionCounters,
    delete: ActionCounters,

    /// Sessions currently in `Running`
    active_sessions: AtomicU64,

    /// Failure counts keyed by status or transport error kind
    error_counts: RwLock<HashMap<String, u64>>,

    start_time: RwLock<Option<Instant>>,
}

impl Default for LoadTestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadTestMetrics {
    pub fn new() -> Self {
        Self {
            list: ActionCounters::default(),
            create: ActionCounters::default(),
            update: ActionCounters::default(),
            delete: ActionCounters::default(),
            active_sessions: AtomicU64::new(0),
            error_counts: RwLock::new(HashMap::new()),
            start_time: RwLock::new(None),
        }
    }

    fn counters(&self, action: Action) -> &ActionCounters {
        match action {
            Action::List => &self.list,
            Action::Create => &self.create,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }

    /// Mark the start of the measured window
    pub fn start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_stopped(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Record one tick of a session
    pub fn record_turn(&self, turn: &Turn, latency: Duration) {
        match turn {
            Turn::Skipped(action) => {
                self.counters(*action).skipped.fetch_add(1, Ordering::Relaxed);
            }
            Turn::Executed { action, outcome } => self.record_outcome(*action, outcome, latency),
        }
    }

    fn record_outcome(&self, action: Action, outcome: &ActionOutcome, latency: Duration) {
        let counters = self.counters(action);
        counters.attempts.fetch_add(1, Ordering::Relaxed);
        counters
            .latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        if outcome.succeeded {
            counters.successes.fetch_add(1, Ordering::Relaxed);
            return;
        }

        counters.failures.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = outcome.failure_kind() {
            *self.error_counts.write().entry(kind).or_insert(0) += 1;
        }
    }

    /// Point-in-time summary
    pub fn summary(&self) -> MetricsSummary {
        let duration = self
            .start_time
            .read()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let actions: HashMap<String, ActionStats> = Action::ALL
            .iter()
            .map(|&action| (action.to_string(), self.counters(action).snapshot()))
            .collect();

        let total: u64 = actions.values().map(|s| s.attempts).sum();
        let successful: u64 = actions.values().map(|s| s.successes).sum();
        let skipped: u64 = actions.values().map(|s| s.skipped).sum();

        MetricsSummary {
            total_requests: total,
            successful_requests: successful,
            failed_requests: total - successful,
            skipped_turns: skipped,
            success_rate: if total > 0 {
                (successful as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            avg_rps: if duration > 0.0 { total as f64 / duration } else { 0.0 },
            duration_secs: duration,
            actions,
            error_counts: self.error_counts.read().clone(),
        }
    }
}

/// Snapshot of one action's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped: u64,
    pub mean_latency_us: u64,
}

/// Metrics summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub skipped_turns: u64,
    pub success_rate: f64,
    pub avg_rps: f64,
    pub duration_secs: f64,
    pub actions: HashMap<String, ActionStats>,
    pub error_counts: HashMap<String, u64>,
}

impl MetricsSummary {
    /// Log the summary, one line per action
    pub fn log(&self) {
        info!(
            "Run finished after {:.1}s: {} requests ({} ok, {} failed, {:.2}% success), {} skipped turns, {:.2} RPS",
            self.duration_secs,
            self.total_requests,
            self.successful_requests,
            self.failed_requests,
            self.success_rate,
            self.skipped_turns,
            self.avg_rps
        );

        for action in Action::ALL {
            if let Some(stats) = self.actions.get(action.name()) {
                info!(
                    "  {:<7} attempts={} ok={} failed={} skipped={} mean={}µs",
                    action.name(),
                    stats.attempts,
                    stats.successes,
                    stats.failures,
                    stats.skipped,
                    stats.mean_latency_us
                );
            }
        }

        let mut errors: Vec<_> = self.error_counts.iter().collect();
        errors.sort();
        for (kind, count) in errors {
            info!("  error {:<12} {}", kind, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn test_record_turns() {
        let metrics = LoadTestMetrics::new();
        let latency = Duration::from_millis(10);

        metrics.record_turn(
            &Turn::Executed {
                action: Action::Create,
                outcome: ActionOutcome::success(201).with_created("1".into()),
            },
            latency,
        );
        metrics.record_turn(
            &Turn::Executed {
                action: Action::Delete,
                outcome: ActionOutcome::failure(404),
            },
            latency,
        );
        metrics.record_turn(
            &Turn::Executed {
                action: Action::List,
                outcome: ActionOutcome::transport_failure(TransportError::Timeout),
            },
            latency,
        );
        metrics.record_turn(&Turn::Skipped(Action::Update), Duration::ZERO);

        let summary = metrics.summary();
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.successful_requests, 1);
        assert_eq!(summary.failed_requests, 2);
        assert_eq!(summary.skipped_turns, 1);
        assert_eq!(summary.actions["create"].mean_latency_us, 10_000);
        assert_eq!(summary.actions["update"].attempts, 0);
        assert_eq!(summary.error_counts["status_404"], 1);
        assert_eq!(summary.error_counts["timeout"], 1);
    }

    #[test]
    fn test_session_gauge() {
        let metrics = LoadTestMetrics::new();
        metrics.session_started();
        metrics.session_started();
        metrics.session_stopped();
        assert_eq!(metrics.active_sessions(), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let metrics = LoadTestMetrics::new();
        metrics.start();
        let json = serde_json::to_value(metrics.summary()).unwrap();
        assert_eq!(json["total_requests"], 0);
        assert!(json["actions"]["list"].is_object());
    }
}
