//! Load test configuration types

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{ConfigurationError, LoadTestError, Result};
use crate::selector::WeightedSelector;

/// Longest accepted gap between two session spawns
pub const MAX_SPAWN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Complete load test configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadTestConfig {
    /// Target base URL
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Number of concurrent virtual sessions
    #[serde(default = "default_users")]
    pub users: usize,

    /// Sessions started per second during ramp-up
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: f64,

    /// Stop after this many seconds; run until interrupted when unset
    #[serde(default)]
    pub run_time_secs: Option<u64>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Base seed for reproducible session randomness
    #[serde(default)]
    pub seed: Option<u64>,

    /// Per-session behavior
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_target_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_users() -> usize {
    10
}

fn default_spawn_rate() -> f64 {
    1.0
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            users: default_users(),
            spawn_rate: default_spawn_rate(),
            run_time_secs: None,
            request_timeout_secs: default_request_timeout(),
            seed: None,
            session: SessionConfig::default(),
        }
    }
}

impl LoadTestConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadTestError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every pool and session setting
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.target_url.trim().is_empty() {
            return Err(ConfigurationError::InvalidPool(
                "target_url is empty".to_string(),
            ));
        }
        if self.users == 0 {
            return Err(ConfigurationError::InvalidPool(
                "users must be at least 1".to_string(),
            ));
        }
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(ConfigurationError::InvalidPool(format!(
                "spawn_rate must be positive, got {}",
                self.spawn_rate
            )));
        }
        match Duration::try_from_secs_f64(1.0 / self.spawn_rate) {
            Ok(period) if !period.is_zero() && period <= MAX_SPAWN_INTERVAL => {}
            _ => {
                return Err(ConfigurationError::InvalidPool(format!(
                    "spawn_rate {} gives no usable spawn interval",
                    self.spawn_rate
                )));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidPool(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.session.validate()
    }

    pub fn run_time(&self) -> Option<Duration> {
        self.run_time_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay between two session spawns, clamped to `[1ns, MAX_SPAWN_INTERVAL]`
    pub fn spawn_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.spawn_rate)
            .unwrap_or(MAX_SPAWN_INTERVAL)
            .clamp(Duration::from_nanos(1), MAX_SPAWN_INTERVAL)
    }
}

/// Behavior of one virtual session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Lower think-time bound in seconds
    #[serde(default = "default_min_wait")]
    pub min_wait_secs: f64,

    /// Upper think-time bound in seconds
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: f64,

    #[serde(default)]
    pub weights: ActionWeights,

    /// Status that marks a create as successful
    #[serde(default = "default_create_status")]
    pub create_success_status: u16,

    /// Status that marks a delete as successful
    #[serde(default = "default_delete_status")]
    pub delete_success_status: u16,

    /// Collection endpoint, relative to the target URL
    #[serde(default = "default_collection_path")]
    pub collection_path: String,

    /// Extra headers sent on every call, on top of the JSON content type
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_min_wait() -> f64 {
    1.0
}

fn default_max_wait() -> f64 {
    5.0
}

fn default_create_status() -> u16 {
    201
}

fn default_delete_status() -> u16 {
    200
}

fn default_collection_path() -> String {
    "/tasks".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_wait_secs: default_min_wait(),
            max_wait_secs: default_max_wait(),
            weights: ActionWeights::default(),
            create_success_status: default_create_status(),
            delete_success_status: default_delete_status(),
            collection_path: default_collection_path(),
            headers: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.think_time()?;

        for (action, status) in [
            (Action::Create, self.create_success_status),
            (Action::Delete, self.delete_success_status),
        ] {
            if !(100..=599).contains(&status) {
                return Err(ConfigurationError::InvalidStatus {
                    action: action.to_string(),
                    status,
                });
            }
        }

        self.weights.build_selector().map(|_| ())
    }

    pub fn think_time(&self) -> std::result::Result<ThinkTime, ConfigurationError> {
        ThinkTime::new(self.min_wait_secs, self.max_wait_secs)
    }

    /// `{collection}/{id}` without doubling the slash
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection_path.trim_end_matches('/'), id)
    }
}

/// Relative frequency of each action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionWeights {
    #[serde(default = "default_list_weight")]
    pub list: u32,
    #[serde(default = "default_create_weight")]
    pub create: u32,
    #[serde(default = "default_minor_weight")]
    pub update: u32,
    #[serde(default = "default_minor_weight")]
    pub delete: u32,
}

fn default_list_weight() -> u32 {
    3
}

fn default_create_weight() -> u32 {
    2
}

fn default_minor_weight() -> u32 {
    1
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            list: default_list_weight(),
            create: default_create_weight(),
            update: default_minor_weight(),
            delete: default_minor_weight(),
        }
    }
}

impl ActionWeights {
    pub fn weight(&self, action: Action) -> u32 {
        match action {
            Action::List => self.list,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    pub fn build_selector(&self) -> std::result::Result<WeightedSelector<Action>, ConfigurationError> {
        WeightedSelector::new(Action::ALL.iter().map(|&action| (action, self.weight(action))))
    }
}

/// Inclusive think-time interval in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThinkTime {
    min: f64,
    max: f64,
}

impl ThinkTime {
    pub fn new(min: f64, max: f64) -> std::result::Result<Self, ConfigurationError> {
        if !min.is_finite()
            || min < 0.0
            || min > max
            || Duration::try_from_secs_f64(max).is_err()
        {
            return Err(ConfigurationError::InvalidThinkTime { min, max });
        }
        Ok(Self { min, max })
    }

    /// Draw a pause uniformly from `[min, max]`
    pub fn draw<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return Duration::from_secs_f64(self.min);
        }
        Duration::from_secs_f64(rng.gen_range(self.min..=self.max))
    }
}
