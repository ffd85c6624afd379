//! The navigable location (the browser's hash + history, headless).

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// What caused the router to re-resolve the location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Initial resolution at start-up.
    Load,
    /// The fragment was assigned or replaced.
    HashChange,
    /// Back/forward through history.
    PopState,
}

/// Location collaborator used by the router.
pub trait Location: Send + Sync {
    /// The current path, normalised (see [`normalize_path`]).
    fn current_path(&self) -> String;

    /// Navigate to `path`, adding a history entry. Navigating to the current
    /// path is ignored and emits nothing.
    fn push(&self, path: &str);

    /// Replace the current history entry with `path`.
    fn replace(&self, path: &str);

    /// Go back one entry. Returns `false` if there is nowhere to go.
    fn back(&self) -> bool;

    /// Deliver future navigation events to `events`.
    fn listen(&self, events: UnboundedSender<NavigationEvent>);
}

/// Strip a leading `#`, make sure the path starts with `/`, drop a trailing
/// `/` (except for the root). Empty input is the root.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('#');
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

// ── MemoryLocation ──

struct HistoryStack {
    entries: Vec<String>,
    index: usize,
    listeners: Vec<UnboundedSender<NavigationEvent>>,
}

impl HistoryStack {
    fn emit(&mut self, event: NavigationEvent) {
        self.listeners.retain(|tx| tx.send(event).is_ok());
    }
}

/// In-memory location with a browser-like history stack.
pub struct MemoryLocation {
    inner: Mutex<HistoryStack>,
}

impl MemoryLocation {
    /// Start at `initial` (a fragment such as `""`, `"#/chat"` or `"/chat"`).
    pub fn new(initial: &str) -> Self {
        Self {
            inner: Mutex::new(HistoryStack {
                entries: vec![normalize_path(initial)],
                index: 0,
                listeners: Vec::new(),
            }),
        }
    }

    /// Number of history entries, including the current one.
    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryStack> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("")
    }
}

impl Location for MemoryLocation {
    fn current_path(&self) -> String {
        let stack = self.lock();
        stack.entries[stack.index].clone()
    }

    fn push(&self, path: &str) {
        let path = normalize_path(path);
        let mut stack = self.lock();
        if stack.entries[stack.index] == path {
            debug!(path, "location unchanged, no event");
            return;
        }
        // A new entry drops any forward history.
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(path);
        stack.index += 1;
        stack.emit(NavigationEvent::HashChange);
    }

    fn replace(&self, path: &str) {
        let path = normalize_path(path);
        let mut stack = self.lock();
        let index = stack.index;
        stack.entries[index] = path;
        stack.emit(NavigationEvent::HashChange);
    }

    fn back(&self) -> bool {
        let mut stack = self.lock();
        if stack.index == 0 {
            return false;
        }
        stack.index -= 1;
        stack.emit(NavigationEvent::PopState);
        true
    }

    fn listen(&self, events: UnboundedSender<NavigationEvent>) {
        self.lock().listeners.push(events);
    }
}
