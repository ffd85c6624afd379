//! Process-wide listeners: uncaught errors, connectivity changes, and
//! keyboard shortcuts.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, info, warn};

use crate::app::AppContext;

/// Store key tracking connectivity.
pub const ONLINE_KEY: &str = "online";

/// A key plus modifiers, written `"ctrl+shift+k"`. Parsing is
/// case-insensitive; the canonical form lists modifiers as
/// ctrl, alt, shift, meta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub key: String,
}

impl KeyChord {
    /// Parse `"alt+d"`. Returns `None` without exactly one non-modifier key.
    pub fn parse(text: &str) -> Option<Self> {
        let mut chord = KeyChord::default();
        let mut key = None;
        for part in text.split('+') {
            let part = part.trim().to_ascii_lowercase();
            match part.as_str() {
                "" => return None,
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                _ => {
                    if key.replace(part).is_some() {
                        return None;
                    }
                }
            }
        }
        chord.key = key?;
        Some(chord)
    }

    /// A bare key with no modifiers.
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "ctrl+"),
            (self.alt, "alt+"),
            (self.shift, "shift+"),
            (self.meta, "meta+"),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        f.write_str(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalEvent {
    UncaughtError(String),
    UnhandledRejection(String),
    Online,
    Offline,
    Key(KeyChord),
}

/// Reacts to [`GlobalEvent`]s on behalf of the whole application.
///
/// Error events become error notifications, but only for the first
/// `max_error_notifications` of a session; later ones are logged only.
pub struct GlobalEvents {
    app: AppContext,
    errors_shown: AtomicUsize,
    max_errors: usize,
    shortcuts: Vec<(KeyChord, String)>,
}

impl GlobalEvents {
    pub fn new(app: AppContext) -> Self {
        let max_errors = app.config().app.max_error_notifications;
        let shortcuts = app
            .config()
            .shortcuts
            .iter()
            .filter_map(|(chord, route)| match KeyChord::parse(chord) {
                Some(parsed) => Some((parsed, route.clone())),
                None => {
                    warn!(chord, "ignoring invalid shortcut");
                    None
                }
            })
            .collect();
        Self {
            app,
            errors_shown: AtomicUsize::new(0),
            max_errors,
            shortcuts,
        }
    }

    /// Handle one event. Returns `true` if it changed something visible
    /// (a notification, a store write or a navigation).
    pub fn handle(&self, event: GlobalEvent) -> bool {
        match event {
            GlobalEvent::UncaughtError(message) => {
                error!(message, "uncaught error");
                self.report_error("An unexpected error occurred")
            }
            GlobalEvent::UnhandledRejection(reason) => {
                error!(reason, "unhandled rejection");
                self.report_error("A background task failed")
            }
            GlobalEvent::Online => {
                info!("connection restored");
                self.app.store().set(ONLINE_KEY, true);
                self.app.notifier().info(self.app.i18n().t("status.online"));
                true
            }
            GlobalEvent::Offline => {
                warn!("connection lost");
                self.app.store().set(ONLINE_KEY, false);
                self.app.notifier().warning(self.app.i18n().t("status.offline"));
                true
            }
            GlobalEvent::Key(chord) => match self.shortcut(&chord) {
                Some(route) => {
                    debug!(%chord, route, "shortcut");
                    self.app.navigator().navigate(route, false);
                    true
                }
                None => false,
            },
        }
    }

    /// Route bound to `chord`, if any.
    pub fn shortcut(&self, chord: &KeyChord) -> Option<&str> {
        self.shortcuts
            .iter()
            .find(|(c, _)| c == chord)
            .map(|(_, route)| route.as_str())
    }

    /// Error notifications shown so far this session.
    pub fn errors_shown(&self) -> usize {
        self.errors_shown.load(Ordering::SeqCst)
    }

    fn report_error(&self, message: &str) -> bool {
        let shown = self.errors_shown.fetch_add(1, Ordering::SeqCst);
        if shown >= self.max_errors {
            // Undo so the counter reports notifications actually shown.
            self.errors_shown.fetch_sub(1, Ordering::SeqCst);
            debug!("error notification suppressed");
            return false;
        }
        self.app.notifier().error(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::OfflineBackend;
    use crate::config::AppConfig;
    use crate::i18n::Translations;
    use crate::location::{Location, MemoryLocation};
    use crate::notify::NotificationKind;
    use crate::store::Store;

    fn events() -> (GlobalEvents, Arc<MemoryLocation>) {
        let location = Arc::new(MemoryLocation::new("/"));
        let app = AppContext::new(
            AppConfig::with_default_shortcuts(),
            Arc::new(Store::new()),
            Arc::new(OfflineBackend),
            Arc::new(Translations::builtin("en")),
            location.clone(),
        );
        (GlobalEvents::new(app), location)
    }

    // ========================================================================
    // KeyChord
    // ========================================================================

    #[test]
    fn parse_chords() {
        assert_eq!(KeyChord::parse("alt+d"), Some(KeyChord::key("d").with_alt()));
        assert_eq!(
            KeyChord::parse("Ctrl + Alt + K"),
            Some(KeyChord::key("k").with_alt().with_ctrl())
        );
        assert_eq!(KeyChord::parse("escape"), Some(KeyChord::key("escape")));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(KeyChord::parse(""), None);
        assert_eq!(KeyChord::parse("alt+"), None);
        assert_eq!(KeyChord::parse("alt+shift"), None);
        assert_eq!(KeyChord::parse("a+b"), None);
    }

    #[test]
    fn display_is_canonical() {
        let chord = KeyChord::parse("shift+meta+ctrl+x").unwrap();
        assert_eq!(chord.to_string(), "ctrl+shift+meta+x");
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn error_notifications_are_capped() {
        let (events, _) = events();
        for i in 0..5 {
            events.handle(GlobalEvent::UncaughtError(format!("boom {}", i)));
        }
        events.handle(GlobalEvent::UnhandledRejection("late".into()));

        assert_eq!(events.errors_shown(), 3);
        let errors = events
            .app
            .notifier()
            .list()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .count();
        assert_eq!(errors, 3);
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    #[test]
    fn offline_then_online() {
        let (events, _) = events();
        events.handle(GlobalEvent::Offline);
        assert_eq!(events.app.store().get(ONLINE_KEY).unwrap().as_bool(), Some(false));
        assert_eq!(
            events.app.notifier().list().last().unwrap().kind,
            NotificationKind::Warning
        );

        events.handle(GlobalEvent::Online);
        assert_eq!(events.app.store().get(ONLINE_KEY).unwrap().as_bool(), Some(true));
        assert_eq!(events.app.notifier().list().last().unwrap().message, "Back online");
    }

    // ========================================================================
    // Shortcuts
    // ========================================================================

    #[test]
    fn default_shortcuts_navigate() {
        let (events, location) = events();
        assert!(events.handle(GlobalEvent::Key(KeyChord::key("d").with_alt())));
        assert_eq!(location.current_path(), "/dashboard");

        assert!(events.handle(GlobalEvent::Key(KeyChord::parse("alt+e").unwrap())));
        assert_eq!(location.current_path(), "/explorer");
    }

    #[test]
    fn unbound_chord_is_ignored() {
        let (events, location) = events();
        assert!(!events.handle(GlobalEvent::Key(KeyChord::key("d"))));
        assert_eq!(location.current_path(), "/");
    }
}
