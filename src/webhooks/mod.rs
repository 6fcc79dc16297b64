//! Captured webhook payloads.
//!
//! Keeps the most recent deliveries in memory so they can be inspected from
//! the dashboard. Oldest entries are evicted once `capacity` is reached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single captured webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub headers: Map<String, Value>,
    pub body: Value,
    pub query: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Webhook {
    pub fn new(
        kind: impl Into<String>,
        headers: Map<String, Value>,
        body: Value,
        query: BTreeMap<String, String>,
    ) -> Self {
        let timestamp = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("wh_{}_{}", timestamp.timestamp_millis(), &suffix[..9]),
            kind: kind.into(),
            headers,
            body,
            query,
            timestamp,
        }
    }
}

/// Bounded in-memory webhook store.
pub struct WebhookStore {
    entries: RwLock<VecDeque<Webhook>>,
    capacity: usize,
}

impl WebhookStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn add(&self, webhook: Webhook) {
        let mut entries = self.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(webhook);
    }

    /// Up to `limit` webhooks, newest first, optionally filtered by type.
    pub fn list(&self, limit: usize, kind: Option<&str>) -> Vec<Webhook> {
        self.read()
            .iter()
            .rev()
            .filter(|w| kind.map_or(true, |k| w.kind == k))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Webhook> {
        self.read().iter().find(|w| w.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove everything, returning how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        count
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<Webhook>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Webhook>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for WebhookStore {
    fn default() -> Self {
        Self::new(500)
    }
}
