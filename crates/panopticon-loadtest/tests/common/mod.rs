//! Test doubles for the task API

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use panopticon_loadtest::{ApiClient, ApiResponse, TransportError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

/// In-process stand-in for the task service.
///
/// Mirrors its status codes: 201 on create, 200 on update/delete, 500 when
/// the addressed task does not exist.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<u64, Value>>,
    next_id: AtomicU64,
    pub calls: AtomicU64,
}

impl TaskStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            ..Default::default()
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    fn id_from_path(path: &str) -> Option<u64> {
        path.rsplit('/').next()?.parse().ok()
    }
}

/// One session's handle on the shared store
#[derive(Debug, Clone)]
pub struct InMemoryClient {
    pub store: Arc<TaskStore>,
    pub headers: BTreeMap<String, String>,
}

impl InMemoryClient {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            headers: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl ApiClient for InMemoryClient {
    fn set_default_headers(&mut self, headers: &BTreeMap<String, String>) {
        self.headers = headers.clone();
    }

    async fn get(&self, _path: &str) -> Result<ApiResponse, TransportError> {
        self.store.calls.fetch_add(1, Ordering::Relaxed);
        let tasks: Vec<Value> = self.store.tasks.lock().values().cloned().collect();
        Ok(ApiResponse::with_body(200, Value::Array(tasks)))
    }

    async fn post(&self, _path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        self.store.calls.fetch_add(1, Ordering::Relaxed);
        let id = self.store.next_id.fetch_add(1, Ordering::Relaxed);
        let task = json!({
            "id": id,
            "title": body["title"],
            "completed": body["completed"],
        });
        self.store.tasks.lock().insert(id, task.clone());
        Ok(ApiResponse::with_body(201, task))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        self.store.calls.fetch_add(1, Ordering::Relaxed);
        let Some(id) = TaskStore::id_from_path(path) else {
            return Ok(ApiResponse::new(400));
        };
        match self.store.tasks.lock().get_mut(&id) {
            Some(task) => {
                task["title"] = body["title"].clone();
                task["completed"] = body["completed"].clone();
                Ok(ApiResponse::new(200))
            }
            None => Ok(ApiResponse::new(500)),
        }
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.store.calls.fetch_add(1, Ordering::Relaxed);
        let Some(id) = TaskStore::id_from_path(path) else {
            return Ok(ApiResponse::new(400));
        };
        match self.store.tasks.lock().remove(&id) {
            Some(_) => Ok(ApiResponse::new(200)),
            None => Ok(ApiResponse::new(500)),
        }
    }
}

/// Client that answers every call with a random status in 200..=599, or a
/// transport error about one time in ten. Creates carry a fresh id.
#[derive(Debug)]
pub struct FlakyClient {
    rng: Mutex<ChaCha8Rng>,
    next_id: AtomicU64,
    pub calls: Arc<AtomicU64>,
}

impl FlakyClient {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            next_id: AtomicU64::new(1_000),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    fn respond(&self, with_id: bool) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut rng = self.rng.lock();

        if rng.gen_ratio(1, 10) {
            return Err(match rng.gen_range(0..3) {
                0 => TransportError::Timeout,
                1 => TransportError::Connect("connection refused".to_string()),
                _ => TransportError::Body("unexpected eof".to_string()),
            });
        }

        let status = rng.gen_range(200..=599);
        if with_id && rng.gen_bool(0.8) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            Ok(ApiResponse::with_body(status, json!({ "id": id })))
        } else {
            Ok(ApiResponse::new(status))
        }
    }
}

#[async_trait]
impl ApiClient for FlakyClient {
    fn set_default_headers(&mut self, _headers: &BTreeMap<String, String>) {}

    async fn get(&self, _path: &str) -> Result<ApiResponse, TransportError> {
        self.respond(false)
    }

    async fn post(&self, _path: &str, _body: &Value) -> Result<ApiResponse, TransportError> {
        self.respond(true)
    }

    async fn put(&self, _path: &str, _body: &Value) -> Result<ApiResponse, TransportError> {
        self.respond(false)
    }

    async fn delete(&self, _path: &str) -> Result<ApiResponse, TransportError> {
        self.respond(false)
    }
}
