//! Session pool: spawns, ramps and retires virtual sessions
//!
//! Sessions are started at `spawn_rate` per second until `users` are
//! running. The pool then waits for the run time to elapse or for the
//! caller's stop future (Ctrl+C in the CLI), flips the shared shutdown
//! signal and joins every session.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info};

use crate::client::ApiClient;
use crate::config::LoadTestConfig;
use crate::error::Result;
use crate::metrics::{LoadTestMetrics, MetricsSummary};
use crate::payload::LoremTitles;
use crate::session::{SessionEngine, SessionReport};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct PoolReport {
    pub sessions: Vec<SessionReport>,
    pub summary: MetricsSummary,
}

/// Drives many sessions against one target
pub struct SessionPool {
    config: LoadTestConfig,
    metrics: Arc<LoadTestMetrics>,
}

impl SessionPool {
    /// Validate the configuration up front so no session starts on a bad one
    pub fn new(config: LoadTestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(LoadTestMetrics::new()),
        })
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<LoadTestMetrics> {
        self.metrics.clone()
    }

    /// Per-session RNG: reproducible when a seed is configured
    fn session_rng(&self, index: usize) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Run the load test.
    ///
    /// `client_for` builds the API client of session `index`. The run ends at
    /// `run_time_secs` or when `stop` resolves, whichever comes first.
    pub async fn run<C, F, S>(&self, client_for: F, stop: S) -> Result<PoolReport>
    where
        C: ApiClient + 'static,
        F: Fn(usize) -> C,
        S: Future<Output = ()>,
    {
        info!(
            "Starting {} sessions against {} at {}/s",
            self.config.users, self.config.target_url, self.config.spawn_rate
        );
        let selector = self.config.session.weights.build_selector()?;
        for (action, weight, probability) in selector.weight_distribution() {
            info!("  {:<7} weight={} ({:.1}%)", action, weight, probability * 100.0);
        }

        self.metrics.start();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles: Vec<JoinHandle<SessionReport>> = Vec::with_capacity(self.config.users);

        let deadline = async {
            match self.config.run_time() {
                Some(run_time) => sleep(run_time).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(stop);

        let mut spawn_tick = interval(self.config.spawn_interval());
        spawn_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Run time elapsed");
                    break;
                }
                _ = &mut stop => {
                    info!("Stop requested");
                    break;
                }
                _ = spawn_tick.tick(), if handles.len() < self.config.users => {
                    let index = handles.len();
                    let engine = SessionEngine::new(
                        index,
                        self.config.session.clone(),
                        client_for(index),
                        LoremTitles,
                        self.session_rng(index),
                    )?
                    .with_metrics(self.metrics.clone());

                    handles.push(tokio::spawn(engine.run(shutdown_rx.clone())));
                    if handles.len() == self.config.users {
                        info!("All {} sessions spawned", handles.len());
                    }
                }
            }
        }

        // Receivers see the flip even if they are mid-call; dropping the
        // sender afterwards also ends any that missed it
        let _ = shutdown_tx.send(true);
        drop(shutdown_tx);

        let mut sessions = Vec::with_capacity(handles.len());
        for result in join_all(handles).await {
            match result {
                Ok(report) => sessions.push(report),
                Err(e) => error!("Session task failed: {}", e),
            }
        }

        let summary = self.metrics.summary();
        info!("Stopped {} sessions", sessions.len());
        Ok(PoolReport { sessions, summary })
    }
}
