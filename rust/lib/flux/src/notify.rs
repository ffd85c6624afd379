use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::Store;
use crate::value::StateValue;

/// Store key holding the visible notification list.
pub const NOTIFICATIONS_KEY: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Posts user-visible notifications into the store.
///
/// The list lives under [`NOTIFICATIONS_KEY`] and is capped; the oldest
/// notification is dropped first. Every change replaces the list, so
/// subscribers to the key re-render on each post or dismiss.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<Store>,
    capacity: usize,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    /// Ids continue after the highest id already in the store, so a
    /// restored list never collides with new posts.
    pub fn new(store: Arc<Store>, capacity: usize) -> Self {
        let last = read_list(&store).iter().map(|n| n.id).max().unwrap_or(0);
        Self {
            store,
            capacity: capacity.max(1),
            next_id: Arc::new(AtomicU64::new(last + 1)),
        }
    }

    /// Post a notification and return its id.
    pub fn post(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        };
        debug!(id = notification.id, ?kind, message = %notification.message, "notification");

        let mut list = self.list();
        list.push(notification.clone());
        if list.len() > self.capacity {
            let excess = list.len() - self.capacity;
            list.drain(..excess);
        }
        self.write(list);
        notification.id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.post(NotificationKind::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.post(NotificationKind::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.post(NotificationKind::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.post(NotificationKind::Error, message)
    }

    /// Remove one notification. Returns `false` if it was not visible.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut list = self.list();
        let before = list.len();
        list.retain(|n| n.id != id);
        if list.len() == before {
            return false;
        }
        self.write(list);
        true
    }

    pub fn clear(&self) {
        self.write(Vec::new());
    }

    /// Currently visible notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        read_list(&self.store)
    }

    fn write(&self, list: Vec<Notification>) {
        let value = serde_json::to_value(&list).unwrap_or(Value::Array(Vec::new()));
        self.store.set(NOTIFICATIONS_KEY, StateValue::new(value));
    }
}

fn read_list(store: &Store) -> Vec<Notification> {
    store
        .get(NOTIFICATIONS_KEY)
        .and_then(|v| v.to_typed::<Vec<Notification>>().ok())
        .unwrap_or_default()
}
