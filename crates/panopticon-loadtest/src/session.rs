//! Virtual session engine
//!
//! One engine drives one simulated client through
//! `Starting → Running → Stopped`. While running it waits a random think
//! time, draws the next action from the weighted selector, performs it
//! against the API client and folds the outcome into its own
//! [`ResourceRegistry`]. Failed calls never end the session; only the
//! shutdown signal does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, RngCore};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::action::{Action, ActionOutcome, TaskPayload, Turn};
use crate::client::{ApiClient, ApiResponse};
use crate::config::{SessionConfig, ThinkTime};
use crate::error::{ConfigurationError, TransportError};
use crate::metrics::LoadTestMetrics;
use crate::payload::PayloadGenerator;
use crate::registry::{ResourceId, ResourceRegistry};
use crate::selector::WeightedSelector;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Starting,
    Running,
    Stopped,
}

/// State owned by exactly one session
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    /// Headers applied to every outgoing call
    pub transport_defaults: BTreeMap<String, String>,
    /// Resources this session created and has not deleted
    pub created_ids: ResourceRegistry,
}

/// Tally returned when a session stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: usize,
    pub executed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Ids still held at shutdown; never cleaned up remotely
    pub outstanding_ids: usize,
}

/// Drives a single virtual session
pub struct SessionEngine<C, P, R> {
    id: usize,
    phase: SessionPhase,
    state: SessionState,
    selector: WeightedSelector<Action>,
    think_time: ThinkTime,
    config: SessionConfig,
    client: C,
    payloads: P,
    rng: R,
    metrics: Option<Arc<LoadTestMetrics>>,
    report: SessionReport,
}

impl<C, P, R> SessionEngine<C, P, R>
where
    C: ApiClient,
    P: PayloadGenerator,
    R: RngCore + Send,
{
    /// Validate the configuration and build a session in `Starting`
    pub fn new(
        id: usize,
        config: SessionConfig,
        client: C,
        payloads: P,
        rng: R,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let selector = config.weights.build_selector()?;
        let think_time = config.think_time()?;

        Ok(Self {
            id,
            phase: SessionPhase::Starting,
            state: SessionState::default(),
            selector,
            think_time,
            config,
            client,
            payloads,
            rng,
            metrics: None,
            report: SessionReport {
                session_id: id,
                ..Default::default()
            },
        })
    }

    /// Attach the run-wide counters
    pub fn with_metrics(mut self, metrics: Arc<LoadTestMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed the registry, e.g. to resume against resources created earlier
    pub fn with_registry(mut self, registry: ResourceRegistry) -> Self {
        self.state.created_ids = registry;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.state.created_ids
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Set transport defaults and enter `Running`
    pub fn start(&mut self) {
        if self.phase != SessionPhase::Starting {
            return;
        }

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        for (name, value) in &self.config.headers {
            headers.insert(name.clone(), value.clone());
        }

        self.client.set_default_headers(&headers);
        self.state.transport_defaults = headers;
        self.phase = SessionPhase::Running;

        if let Some(metrics) = &self.metrics {
            metrics.session_started();
        }
        debug!(session = self.id, "Session running");
    }

    /// Leave `Running`. Remote resources are left as they are.
    pub fn stop(&mut self) {
        if self.phase == SessionPhase::Running {
            if let Some(metrics) = &self.metrics {
                metrics.session_stopped();
            }
        }
        self.phase = SessionPhase::Stopped;
        self.report.outstanding_ids = self.state.created_ids.len();
        debug!(
            session = self.id,
            executed = self.report.executed,
            outstanding = self.report.outstanding_ids,
            "Session stopped"
        );
    }

    /// Run until `shutdown` flips to true or its sender goes away
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionReport {
        self.start();

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.step() => {}
            }
        }

        self.stop();
        self.report
    }

    /// Think-time wait followed by one tick. `None` once stopped.
    pub async fn step(&mut self) -> Option<Turn> {
        if self.phase == SessionPhase::Stopped {
            return None;
        }
        let pause = self.think_time.draw(&mut self.rng);
        trace!(session = self.id, pause_ms = pause.as_millis() as u64, "Thinking");
        tokio::time::sleep(pause).await;
        self.tick().await
    }

    /// Select an action, execute it and apply the outcome. No wait.
    ///
    /// A stopped session performs nothing and returns `None`.
    pub async fn tick(&mut self) -> Option<Turn> {
        match self.phase {
            SessionPhase::Stopped => return None,
            SessionPhase::Starting => self.start(),
            SessionPhase::Running => {}
        }

        let action = *self.selector.select(&mut self.rng);
        let started = Instant::now();
        let turn = match self.execute(action).await {
            Some(outcome) => {
                self.apply(&outcome);
                Turn::Executed { action, outcome }
            }
            None => Turn::Skipped(action),
        };

        self.account(&turn, started);
        Some(turn)
    }

    /// Perform one action. `None` means the turn was skipped.
    pub async fn execute(&mut self, action: Action) -> Option<ActionOutcome> {
        match action {
            Action::List => Some(self.list().await),
            Action::Create => Some(self.create().await),
            Action::Update => {
                let id = self.pick_target()?;
                Some(self.update(id).await)
            }
            Action::Delete => {
                let id = self.pick_target()?;
                Some(self.delete(id).await)
            }
        }
    }

    fn pick_target(&mut self) -> Option<ResourceId> {
        self.state.created_ids.pick_random(&mut self.rng).cloned()
    }

    async fn list(&mut self) -> ActionOutcome {
        let result = self.client.get(&self.config.collection_path).await;
        outcome_from(result, |response| response.is_success())
    }

    async fn create(&mut self) -> ActionOutcome {
        let payload = TaskPayload {
            title: self.payloads.title(&mut self.rng),
            completed: false,
        };
        let body = payload_json(&payload);

        let response = match self.client.post(&self.config.collection_path, &body).await {
            Ok(response) => response,
            Err(e) => return ActionOutcome::transport_failure(e),
        };

        if response.status != self.config.create_success_status {
            return ActionOutcome::failure(response.status);
        }

        match response.id_field().and_then(ResourceId::from_json) {
            Some(id) => ActionOutcome::success(response.status).with_created(id),
            None => {
                warn!(
                    session = self.id,
                    status = response.status,
                    "Create succeeded without an id in the body"
                );
                ActionOutcome::failure(response.status)
            }
        }
    }

    async fn update(&mut self, id: ResourceId) -> ActionOutcome {
        let payload = TaskPayload {
            title: self.payloads.title(&mut self.rng),
            completed: self.rng.gen_bool(0.5),
        };
        let body = payload_json(&payload);
        let path = self.config.item_path(id.as_str());

        let result = self.client.put(&path, &body).await;
        outcome_from(result, |response| response.is_success())
    }

    async fn delete(&mut self, id: ResourceId) -> ActionOutcome {
        let path = self.config.item_path(id.as_str());
        let expected = self.config.delete_success_status;

        let outcome = outcome_from(self.client.delete(&path).await, |response| {
            response.status == expected
        });
        if outcome.succeeded {
            outcome.with_deleted(id)
        } else {
            outcome
        }
    }

    /// Fold a completed action into the registry
    fn apply(&mut self, outcome: &ActionOutcome) {
        if !outcome.succeeded {
            return;
        }
        if let Some(id) = &outcome.created_id {
            if let Err(e) = self.state.created_ids.record(id.clone()) {
                warn!(session = self.id, "{}", e);
            }
        }
        if let Some(id) = &outcome.deleted_id {
            self.state.created_ids.remove(id);
        }
    }

    fn account(&mut self, turn: &Turn, started: Instant) {
        let latency = started.elapsed();

        match turn {
            Turn::Skipped(action) => {
                self.report.skipped += 1;
                trace!(session = self.id, %action, "Skipped, no resources held");
            }
            Turn::Executed { action, outcome } => {
                self.report.executed += 1;
                if !outcome.succeeded {
                    self.report.failed += 1;
                }
                debug!(
                    session = self.id,
                    %action,
                    status = outcome.status,
                    ok = outcome.succeeded,
                    held = self.state.created_ids.len(),
                    "Action complete"
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_turn(turn, latency);
        }
    }
}

fn payload_json(payload: &TaskPayload) -> Value {
    serde_json::json!({
        "title": payload.title,
        "completed": payload.completed,
    })
}

/// Map a call result onto an outcome using the action's success rule
fn outcome_from<F>(result: Result<ApiResponse, TransportError>, is_success: F) -> ActionOutcome
where
    F: Fn(&ApiResponse) -> bool,
{
    match result {
        Ok(response) if is_success(&response) => ActionOutcome::success(response.status),
        Ok(response) => ActionOutcome::failure(response.status),
        Err(e) => ActionOutcome::transport_failure(e),
    }
}
