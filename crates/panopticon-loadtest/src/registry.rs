//! Session-local registry of resources created by one virtual session
//!
//! Update and delete turns may only address ids this session has created and
//! not yet deleted. The registry keeps those ids in a dense vector for uniform
//! random picks and an index map for O(1) membership and removal.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Identifier of a resource on the API under test.
///
/// The task service returns numeric ids; they are kept as their decimal text
/// so the same type works for services that hand out string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract an id from a JSON `id` field, accepting numbers and strings
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for ResourceId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Ids created by this session and not yet deleted by it
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    ids: Vec<ResourceId>,
    positions: HashMap<ResourceId, usize>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an id returned by a successful create
    pub fn record(&mut self, id: ResourceId) -> Result<(), RegistryError> {
        if self.positions.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.positions.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        Ok(())
    }

    /// Uniformly random id, or `None` when nothing is held
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ResourceId> {
        if self.ids.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.ids.len());
        self.ids.get(index)
    }

    /// Remove an id. Absent ids are ignored; returns whether anything was removed.
    pub fn remove(&mut self, id: &ResourceId) -> bool {
        let Some(index) = self.positions.remove(id) else {
            return false;
        };

        self.ids.swap_remove(index);
        // The former last element now lives at `index`
        if let Some(moved) = self.ids.get(index) {
            self.positions.insert(moved.clone(), index);
        }
        true
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceId> {
        self.ids.iter()
    }
}

impl FromIterator<ResourceId> for ResourceRegistry {
    /// Build a registry, silently dropping repeated ids
    fn from_iter<I: IntoIterator<Item = ResourceId>>(iter: I) -> Self {
        let mut registry = Self::new();
        for id in iter {
            let _ = registry.record(id);
        }
        registry
    }
}
