//! Application start-up: builds the shared context, checks the backend and
//! the component set, starts the router and loads initial data.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::{Backend, OfflineBackend};
use crate::app::AppContext;
use crate::component::Component;
use crate::config::AppConfig;
use crate::error::BootError;
use crate::events::{GlobalEvent, GlobalEvents, ONLINE_KEY};
use crate::i18n::Translations;
use crate::location::{Location, MemoryLocation};
use crate::notify::NOTIFICATIONS_KEY;
use crate::router::{Router, CURRENT_ROUTE_KEY};
use crate::storage::{MemoryStorage, PersistentStorage};
use crate::store::{Store, Unsubscribe};
use crate::surface::{MemorySurface, Surface};
use crate::value::StateValue;
use crate::views;

pub const LANGUAGE_KEY: &str = "language";
pub const API_CONNECTED_KEY: &str = "apiConnected";
pub const SYSTEM_STATUS_KEY: &str = "systemStatus";

/// Keys describing the previous session only. They are saved with the rest
/// of the map but dropped again on restore.
pub const SESSION_KEYS: &[&str] = &[
    NOTIFICATIONS_KEY,
    CURRENT_ROUTE_KEY,
    API_CONNECTED_KEY,
    SYSTEM_STATUS_KEY,
];

/// Collects the collaborators and routes, then runs the start-up sequence.
///
/// Every collaborator has an in-memory default, so only the routes are
/// usually needed in tests.
///
/// # Examples
///
/// ```ignore
/// let app = Bootstrap::new(config)
///     .backend(Arc::new(http))
///     .storage(Arc::new(RedbStorage::open(&db)?))
///     .route("/", Arc::new(Home))
///     .route("/dashboard", Arc::new(Dashboard))
///     .start()
///     .await?;
/// ```
pub struct Bootstrap {
    config: AppConfig,
    surface: Arc<dyn Surface>,
    location: Arc<dyn Location>,
    storage: Arc<dyn PersistentStorage>,
    backend: Arc<dyn Backend>,
    translations: Option<Arc<Translations>>,
    routes: Vec<(String, Arc<dyn Component>)>,
}

impl Bootstrap {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            surface: Arc::new(MemorySurface::new()),
            location: Arc::new(MemoryLocation::default()),
            storage: Arc::new(MemoryStorage::new()),
            backend: Arc::new(OfflineBackend),
            translations: None,
            routes: Vec::new(),
        }
    }

    pub fn surface(mut self, surface: Arc<dyn Surface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = location;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn PersistentStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = backend;
        self
    }

    /// Use these translations instead of the built-in catalog.
    pub fn translations(mut self, translations: Arc<Translations>) -> Self {
        self.translations = Some(translations);
        self
    }

    pub fn route(mut self, path: &str, component: Arc<dyn Component>) -> Self {
        self.routes.push((path.to_string(), component));
        self
    }

    /// Run the start-up sequence.
    ///
    /// A configuration problem or a missing required component is fatal: the
    /// start-up error view replaces the page and the error is returned. A
    /// failing backend is not; the app starts disconnected.
    pub async fn start(self) -> Result<App, BootError> {
        let surface = Arc::clone(&self.surface);
        match self.run().await {
            Ok(app) => {
                info!("application started");
                Ok(app)
            }
            Err(e) => {
                error!(error = %e, "application failed to start");
                surface.mount(&views::startup_error_view(&e.to_string()));
                surface.set_title("Startup error");
                Err(e)
            }
        }
    }

    async fn run(self) -> Result<App, BootError> {
        let Bootstrap {
            config,
            surface,
            location,
            storage,
            backend,
            translations,
            routes,
        } = self;

        // 1. Store
        config.validate()?;
        let store = Arc::new(Store::with_storage(storage, config.app.history_limit));
        let restored = store.load_from_storage(&config.app.storage_slot);
        for key in SESSION_KEYS {
            store.delete(key);
        }
        if !store.contains(LANGUAGE_KEY) {
            store.set(LANGUAGE_KEY, config.i18n.default_language.as_str());
        }
        store.set(ONLINE_KEY, true);

        let i18n = translations.unwrap_or_else(|| Arc::new(load_translations(&config)));
        let language_binding = bind_language(&store, &i18n);
        info!(restored, "store ready");

        let app = AppContext::new(config, Arc::clone(&store), backend, i18n, location);

        // 2. API health check
        match app.backend().health_check().await {
            Ok(_) => {
                store.set(API_CONNECTED_KEY, true);
                info!("backend reachable");
            }
            Err(e) => {
                warn!(error = %e, "backend health check failed");
                store.set(API_CONNECTED_KEY, false);
                app.notifier().warning(api_down_message(&app, &e.user_message()));
            }
        }

        // 3. Required components
        let missing: Vec<String> = app
            .config()
            .app
            .required_components
            .iter()
            .filter(|name| !routes.iter().any(|(_, c)| c.name() == name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BootError::MissingComponents(missing));
        }
        info!(components = routes.len(), "components verified");

        // 4. Router
        let router = Arc::new(Router::new(app.clone(), surface));
        for (path, component) in routes {
            router.register(&path, component);
        }
        router.start();
        router.process_pending().await;
        info!(state = ?router.state(), "router started");

        // 5. Global listeners
        let events = GlobalEvents::new(app.clone());
        info!("global listeners bound");

        // 6. Initial data
        match app.backend().system_status().await {
            Ok(status) => {
                store.set(SYSTEM_STATUS_KEY, StateValue::new(status));
                info!("system status loaded");
            }
            Err(e) => {
                warn!(error = %e, "failed to load system status");
                store.set(API_CONNECTED_KEY, false);
                app.notifier().error(e.user_message());
            }
        }

        Ok(App {
            context: app,
            router,
            events,
            language_binding,
        })
    }
}

/// Built-in strings, plus any dictionaries in `config.i18n.dir`.
fn load_translations(config: &AppConfig) -> Translations {
    let i18n = Translations::builtin(&config.i18n.default_language);
    if let Some(dir) = &config.i18n.dir {
        match i18n.load_dir(Path::new(dir)) {
            Ok(count) => info!(dir, count, "translations loaded"),
            Err(e) => warn!(dir, error = %e, "failed to load translations"),
        }
    }
    i18n
}

/// Keep the translation locale in step with the store's `language` key.
fn bind_language(store: &Store, i18n: &Arc<Translations>) -> Unsubscribe {
    if let Some(language) = store.get(LANGUAGE_KEY).and_then(|v| v.as_str().map(str::to_string)) {
        i18n.set_locale(&language);
    }
    let i18n = Arc::clone(i18n);
    store.subscribe(LANGUAGE_KEY, move |new, _, _| {
        if let Some(language) = new.and_then(|v| v.as_str()) {
            i18n.set_locale(language);
        }
    })
}

fn api_down_message(app: &AppContext, reason: &str) -> String {
    app.i18n().t("status.api_down").replace("{reason}", reason)
}

/// A started application.
pub struct App {
    context: AppContext,
    router: Arc<Router>,
    events: GlobalEvents,
    language_binding: Unsubscribe,
}

impl App {
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn events(&self) -> &GlobalEvents {
        &self.events
    }

    /// Forward a process-wide event to the global listeners.
    pub fn dispatch(&self, event: GlobalEvent) -> bool {
        self.events.handle(event)
    }

    /// Run a `data-action` from one of the built-in views. Returns `false`
    /// for unknown actions.
    pub async fn action(&self, action: &str) -> bool {
        match action {
            "retry" | "reload" => self.router.retry().await,
            "home" => {
                self.router.go_home().await;
                self.router.process_pending().await;
            }
            _ => return false,
        }
        true
    }

    /// Save the store to its persistent slot. Failures are logged.
    pub fn persist(&self) {
        self.context
            .store()
            .save_to_storage(&self.context.config().app.storage_slot);
    }

    /// Persist, then detach the language binding.
    pub fn shutdown(&self) {
        self.persist();
        self.language_binding.unsubscribe();
        info!(route = ?self.router.current_path(), "shut down");
    }
}
