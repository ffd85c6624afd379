use std::sync::Arc;

use tracing::debug;

use crate::api::Backend;
use crate::config::AppConfig;
use crate::i18n::Translations;
use crate::location::{normalize_path, Location};
use crate::notify::Notifier;
use crate::store::Store;

/// Everything a component or the bootstrapper needs, passed explicitly.
///
/// One instance is built at start-up and cloned into the router, the global
/// event handler and every component context. Cloning is cheap: every field
/// is shared.
///
/// # Examples
///
/// ```ignore
/// let app = AppContext::new(config, store, backend, translations, location);
///
/// app.store().set("theme", "dark");
/// app.notifier().info("Preferences saved");
/// app.navigator().navigate("/dashboard", false);
/// ```
#[derive(Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
    store: Arc<Store>,
    notifier: Notifier,
    backend: Arc<dyn Backend>,
    i18n: Arc<Translations>,
    navigator: Navigator,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<Store>,
        backend: Arc<dyn Backend>,
        i18n: Arc<Translations>,
        location: Arc<dyn Location>,
    ) -> Self {
        let notifier = Notifier::new(Arc::clone(&store), config.app.max_notifications);
        let navigator = Navigator::new(location, &config.app.default_route);
        Self {
            config: Arc::new(config),
            store,
            notifier,
            backend,
            i18n,
            navigator,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn i18n(&self) -> &Arc<Translations> {
        &self.i18n
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Current UI language, as stored under `language`.
    pub fn language(&self) -> String {
        self.store
            .get("language")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| self.config.i18n.default_language.clone())
    }
}

/// Writes to the location. The router reacts to the resulting events, so a
/// `navigate` call returns before the transition has happened.
#[derive(Clone)]
pub struct Navigator {
    location: Arc<dyn Location>,
    home: String,
}

impl Navigator {
    pub fn new(location: Arc<dyn Location>, home: &str) -> Self {
        Self {
            location,
            home: normalize_path(home),
        }
    }

    /// Push (or, with `replace`, replace) `path` onto the location.
    pub fn navigate(&self, path: &str, replace: bool) {
        let path = normalize_path(path);
        debug!(path, replace, "navigate");
        if replace {
            self.location.replace(&path);
        } else {
            self.location.push(&path);
        }
    }

    pub fn go_home(&self) {
        self.navigate(&self.home, false);
    }

    pub fn back(&self) -> bool {
        self.location.back()
    }

    pub fn current_path(&self) -> String {
        self.location.current_path()
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OfflineBackend;
    use crate::location::MemoryLocation;

    fn context(location: Arc<MemoryLocation>) -> AppContext {
        AppContext::new(
            AppConfig::with_default_shortcuts(),
            Arc::new(Store::new()),
            Arc::new(OfflineBackend),
            Arc::new(Translations::builtin("en")),
            location,
        )
    }

    #[test]
    fn clones_share_state() {
        let app = context(Arc::new(MemoryLocation::default()));
        let other = app.clone();

        app.store().set("theme", "dark");
        assert_eq!(other.store().get("theme").unwrap().as_str(), Some("dark"));

        other.notifier().info("hello");
        assert_eq!(app.notifier().list().len(), 1);
    }

    #[test]
    fn language_defaults_to_config() {
        let app = context(Arc::new(MemoryLocation::default()));
        assert_eq!(app.language(), "en");
        app.store().set("language", "ta");
        assert_eq!(app.language(), "ta");
    }

    #[test]
    fn navigator_pushes_and_replaces() {
        let location = Arc::new(MemoryLocation::new("/"));
        let app = context(location.clone());

        app.navigator().navigate("dashboard", false);
        assert_eq!(location.current_path(), "/dashboard");
        assert_eq!(location.history_len(), 2);

        app.navigator().navigate("/chat", true);
        assert_eq!(location.current_path(), "/chat");
        assert_eq!(location.history_len(), 2);

        app.navigator().go_home();
        assert_eq!(app.navigator().current_path(), "/");
        assert!(app.navigator().back());
        assert_eq!(location.current_path(), "/chat");
    }
}
