//! Actions a virtual session can take and the outcome of taking them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::registry::ResourceId;

/// One discrete operation against the task collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// `GET /tasks`
    List,
    /// `POST /tasks`
    Create,
    /// `PUT /tasks/{id}` on an id this session created
    Update,
    /// `DELETE /tasks/{id}` on an id this session created
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::List, Action::Create, Action::Update, Action::Delete];

    pub fn name(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Whether the action addresses an existing resource from the registry
    pub fn needs_resource(&self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request body for create and update calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub completed: bool,
}

/// Result of one executed action.
///
/// Built per invocation and consumed right away by the session engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    pub succeeded: bool,
    /// Status code, when a response came back at all
    pub status: Option<u16>,
    pub created_id: Option<ResourceId>,
    pub deleted_id: Option<ResourceId>,
    pub error: Option<TransportError>,
}

impl ActionOutcome {
    pub fn success(status: u16) -> Self {
        Self {
            succeeded: true,
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failure(status: u16) -> Self {
        Self {
            succeeded: false,
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn transport_failure(error: TransportError) -> Self {
        Self {
            succeeded: false,
            status: None,
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_created(mut self, id: ResourceId) -> Self {
        self.created_id = Some(id);
        self
    }

    pub fn with_deleted(mut self, id: ResourceId) -> Self {
        self.deleted_id = Some(id);
        self
    }

    /// Counter key describing why the call failed
    pub fn failure_kind(&self) -> Option<String> {
        if self.succeeded {
            return None;
        }
        match (&self.error, self.status) {
            (Some(e), _) => Some(e.kind().to_string()),
            (None, Some(status)) => Some(format!("status_{}", status)),
            (None, None) => Some("unknown".to_string()),
        }
    }
}

/// What happened on one scheduling tick
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Update/delete drawn with an empty registry; no call was issued
    Skipped(Action),
    Executed {
        action: Action,
        outcome: ActionOutcome,
    },
}

impl Turn {
    pub fn action(&self) -> Action {
        match self {
            Turn::Skipped(action) => *action,
            Turn::Executed { action, .. } => *action,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Turn::Skipped(_))
    }

    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Turn::Skipped(_) => None,
            Turn::Executed { outcome, .. } => Some(outcome),
        }
    }
}
