//! # Panopticon Load Testing
//!
//! Generates synthetic load against the Panopticon task API by simulating
//! many independent client sessions.
//!
//! ## Features
//!
//! - **Virtual sessions**: each session waits a random think time, picks a
//!   weighted action (list, create, update, delete) and performs it
//! - **Session-local bookkeeping**: sessions only update or delete tasks they
//!   created themselves
//! - **Failure tolerant**: non-2xx responses and transport errors are counted,
//!   never fatal
//! - **Reproducible**: optional seed drives every session's randomness
//!
//! ## Usage
//!
//! ```bash
//! # 50 sessions, 5 new per second, for two minutes
//! cargo run --package panopticon-loadtest -- --target http://localhost:8080 --users 50 --spawn-rate 5 --run-time 120
//!
//! # Load settings from a file, override the user count
//! cargo run --package panopticon-loadtest -- --config loadtest.toml --users 200
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   SessionPool ──spawn──► SessionEngine ×N
//!                            │  think time
//!                            │  WeightedSelector ─► Action
//!                            │  ApiClient (reqwest)
//!                            └► ResourceRegistry (session-local)
//! ```

pub mod action;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod pool;
pub mod registry;
pub mod selector;
pub mod session;

pub use action::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use payload::*;
pub use pool::*;
pub use registry::*;
pub use selector::*;
pub use session::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionOutcome, Turn};
    pub use crate::client::{ApiClient, ApiResponse, HttpApiClient};
    pub use crate::config::{ActionWeights, LoadTestConfig, SessionConfig};
    pub use crate::error::{ConfigurationError, LoadTestError, Result, TransportError};
    pub use crate::pool::{PoolReport, SessionPool};
    pub use crate::registry::{ResourceId, ResourceRegistry};
    pub use crate::session::{SessionEngine, SessionPhase, SessionReport};
}
