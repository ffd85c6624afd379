use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::history::{HistoryLog, HistoryRecord};
use crate::storage::{MemoryStorage, PersistentStorage};
use crate::value::{StateValue, SubscriptionId};

/// Key that receives every change in the store.
pub const WILDCARD: &str = "*";

/// Default number of history records kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Callback type for state change notifications: `(new, old, key)`.
///
/// `new` is `None` when the key was deleted, `old` is `None` when the key
/// did not exist before.
pub type ChangeHandler = Arc<dyn Fn(Option<&StateValue>, Option<&StateValue>, &str) + Send + Sync>;

type Subscribers = RwLock<HashMap<String, Vec<HandlerEntry>>>;

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    handler: ChangeHandler,
}

/// Process-wide reactive key-value store.
///
/// - `set(key, value)` commits a value and notifies key and wildcard subscribers.
/// - `get(key)` reads the current value (Arc clone, cheap).
/// - `subscribe(key | "*", handler)` registers a change handler.
/// - `save_to_storage(slot)` / `load_from_storage(slot)` persist the whole map.
///
/// Notifications are synchronous and run after every lock is released, so a
/// handler may read or write the store again. A panicking handler is caught
/// and logged; the remaining handlers still run.
pub struct Store {
    /// Current values, keyed by exact key. BTreeMap for stable snapshots.
    values: RwLock<BTreeMap<String, StateValue>>,
    /// Shared with `Unsubscribe` handles through a `Weak`.
    subscribers: Arc<Subscribers>,
    history: Mutex<HistoryLog>,
    storage: Arc<dyn PersistentStorage>,
    next_id: AtomicU64,
}

impl Store {
    /// Create an empty store backed by in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()), DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty store persisting to `storage`, keeping at most
    /// `history_limit` history records.
    pub fn with_storage(storage: Arc<dyn PersistentStorage>, history_limit: usize) -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            history: Mutex::new(HistoryLog::new(history_limit)),
            storage,
            next_id: AtomicU64::new(1),
        }
    }

    // ====================================================================
    // Read
    // ====================================================================

    /// Get the current value for `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<StateValue> {
        read(&self.values).get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        read(&self.values).contains_key(key)
    }

    pub fn len(&self) -> usize {
        read(&self.values).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        read(&self.values).keys().cloned().collect()
    }

    /// Snapshot of every key and value, ordered by key.
    pub fn snapshot(&self) -> Vec<(String, StateValue)> {
        read(&self.values)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ====================================================================
    // Write
    // ====================================================================

    /// Set `key` to `value` and notify subscribers.
    ///
    /// No-op when `value` is the same as the current value (shallow
    /// sameness, see [`StateValue::same`]).
    pub fn set(&self, key: &str, value: impl Into<StateValue>) -> &Self {
        let value = value.into();
        let old = {
            let mut values = write(&self.values);
            if let Some(current) = values.get(key) {
                if current.same(&value) {
                    return self;
                }
            }
            let old = values.insert(key.to_string(), value.clone());
            // Recorded under the values lock so history follows commit order.
            lock(&self.history).push(key, old.clone(), Some(value.clone()));
            old
        };

        self.notify(key, Some(&value), old.as_ref());
        self
    }

    /// Shallow-merge the fields of `partial` onto the current object value,
    /// then `set` the result.
    ///
    /// A missing or non-object current value is treated as an empty object.
    /// A non-object `partial` contributes no fields.
    pub fn update(&self, key: &str, partial: Value) -> &Self {
        let mut merged = match self.get(key).as_deref() {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        if let Value::Object(fields) = partial {
            merged.extend(fields);
        }
        self.set(key, Value::Object(merged))
    }

    /// Remove `key`. Notifies with `new = None` only if the key existed.
    pub fn delete(&self, key: &str) -> &Self {
        let old = {
            let mut values = write(&self.values);
            let old = values.remove(key);
            if let Some(old) = &old {
                lock(&self.history).push(key, Some(old.clone()), None);
            }
            old
        };
        if let Some(old) = old {
            self.notify(key, None, Some(&old));
        }
        self
    }

    fn notify(&self, key: &str, new: Option<&StateValue>, old: Option<&StateValue>) {
        // Clone the handler list so no lock is held while handlers run.
        let entries: Vec<HandlerEntry> = {
            let subscribers = read(&self.subscribers);
            let exact = subscribers.get(key).into_iter().flatten();
            let wildcard = if key == WILDCARD {
                None
            } else {
                subscribers.get(WILDCARD)
            };
            exact.chain(wildcard.into_iter().flatten()).cloned().collect()
        };

        for entry in entries {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(new, old, key)));
            if let Err(payload) = outcome {
                error!(
                    key,
                    subscription = entry.id.0,
                    "state subscriber panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    // ====================================================================
    // Subscriptions
    // ====================================================================

    /// Subscribe to changes of `key`, or of every key with [`WILDCARD`].
    ///
    /// The returned handle removes exactly this handler. Calling it more
    /// than once is harmless.
    pub fn subscribe<F>(&self, key: &str, handler: F) -> Unsubscribe
    where
        F: Fn(Option<&StateValue>, Option<&StateValue>, &str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write(&self.subscribers)
            .entry(key.to_string())
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });
        Unsubscribe {
            key: key.to_string(),
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Remove a handler by key and subscription id.
    pub fn unsubscribe(&self, key: &str, id: SubscriptionId) {
        remove_subscriber(&self.subscribers, key, id);
    }

    /// Number of handlers registered under `key` (wildcard not included).
    pub fn subscriber_count(&self, key: &str) -> usize {
        read(&self.subscribers).get(key).map_or(0, Vec::len)
    }

    // ====================================================================
    // Computed values
    // ====================================================================

    /// Keep `derived_key` equal to `compute(deps)`.
    ///
    /// Computes once immediately, then again whenever any dependency changes.
    /// `compute` receives the dependency values in the order of `deps`.
    pub fn computed<F>(self: &Arc<Self>, derived_key: &str, deps: &[&str], compute: F) -> Computed
    where
        F: Fn(&[Option<StateValue>]) -> StateValue + Send + Sync + 'static,
    {
        let store = Arc::downgrade(self);
        let dep_keys: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        let target = derived_key.to_string();
        let recompute: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            let inputs: Vec<Option<StateValue>> = dep_keys.iter().map(|k| store.get(k)).collect();
            store.set(&target, compute(&inputs));
        });

        recompute();

        let watchers = deps
            .iter()
            .map(|dep| {
                let recompute = Arc::clone(&recompute);
                self.subscribe(dep, move |_, _, _| recompute())
            })
            .collect();

        Computed {
            key: derived_key.to_string(),
            watchers,
        }
    }

    // ====================================================================
    // History
    // ====================================================================

    /// Recorded changes, oldest first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        lock(&self.history).records()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    // ====================================================================
    // Persistence
    // ====================================================================

    /// Serialize the whole map into the persistent slot `slot`.
    pub fn try_save(&self, slot: &str) -> Result<(), StoreError> {
        let map: Map<String, Value> = self
            .snapshot()
            .into_iter()
            .map(|(k, v)| (k, v.as_value().clone()))
            .collect();
        let text = serde_json::to_string(&Value::Object(map))?;
        self.storage.set_item(slot, &text)?;
        debug!(slot, bytes = text.len(), "state saved");
        Ok(())
    }

    /// Restore every key found in `slot` through `set`, so subscribers are
    /// notified as usual. Returns the number of keys restored; a missing slot
    /// restores nothing.
    pub fn try_load(&self, slot: &str) -> Result<usize, StoreError> {
        let Some(text) = self.storage.get_item(slot)? else {
            return Ok(0);
        };
        let Value::Object(map) = serde_json::from_str::<Value>(&text)? else {
            return Err(StoreError::Malformed(slot.to_string()));
        };
        let restored = map.len();
        for (key, value) in map {
            self.set(&key, StateValue::new(value));
        }
        debug!(slot, restored, "state restored");
        Ok(restored)
    }

    /// Like [`Store::try_save`], but failures are logged and swallowed.
    pub fn save_to_storage(&self, slot: &str) {
        if let Err(e) = self.try_save(slot) {
            warn!(slot, error = %e, "failed to save state");
        }
    }

    /// Like [`Store::try_load`], but failures are logged and swallowed.
    pub fn load_from_storage(&self, slot: &str) -> usize {
        match self.try_load(slot) {
            Ok(restored) => restored,
            Err(e) => {
                warn!(slot, error = %e, "failed to load state");
                0
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

// ── Unsubscribe ──

/// Handle returned by [`Store::subscribe`].
///
/// Holds only a weak reference, so it neither keeps the store alive nor
/// fails after the store is gone.
pub struct Unsubscribe {
    key: String,
    id: SubscriptionId,
    subscribers: Weak<Subscribers>,
}

impl Unsubscribe {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remove the handler. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            remove_subscriber(&subscribers, &self.key, self.id);
        }
    }
}

// ── Computed ──

/// Handle returned by [`Store::computed`].
pub struct Computed {
    key: String,
    watchers: Vec<Unsubscribe>,
}

impl Computed {
    /// The derived key this handle maintains.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop recomputing. The last derived value stays in the store.
    pub fn dispose(&self) {
        for watcher in &self.watchers {
            watcher.unsubscribe();
        }
    }
}

fn remove_subscriber(subscribers: &Subscribers, key: &str, id: SubscriptionId) {
    let mut subscribers = write(subscribers);
    if let Some(entries) = subscribers.get_mut(key) {
        entries.retain(|e| e.id != id);
        if entries.is_empty() {
            subscribers.remove(key);
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// A handler panic never happens while a lock is held, but recover from
// poisoning anyway so one bad writer can't wedge the store.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
