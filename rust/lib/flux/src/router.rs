use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

use crate::app::AppContext;
use crate::component::{Component, ComponentContext, RouteToken};
use crate::error::ComponentError;
use crate::location::{normalize_path, NavigationEvent};
use crate::store::panic_message;
use crate::surface::Surface;
use crate::views;

/// Store key mirroring the active route path.
pub const CURRENT_ROUTE_KEY: &str = "currentRoute";

/// Why the router is showing an error view.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteFailure {
    /// Neither the path nor the default route has a component.
    NotFound(String),
    /// The matched component failed in render or init.
    ComponentFailed(ComponentError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteState {
    NoRoute,
    Loading,
    Active(String),
    Error(RouteFailure),
}

struct ActiveRoute {
    path: String,
    component: Arc<dyn Component>,
    ctx: Arc<ComponentContext>,
}

/// Hash router: maps location paths to components and drives their
/// lifecycle.
///
/// Navigation never transitions inline. The location emits a
/// [`NavigationEvent`] into the router's queue, and the queue is drained by
/// [`Router::process_pending`] or [`Router::run`]. Transitions are
/// serialised: the outgoing component's `destroy` finishes before the
/// incoming component renders.
///
/// # Examples
///
/// ```ignore
/// let router = Router::new(app, surface);
/// router.register("/", Arc::new(Home));
/// router.register("/dashboard", Arc::new(Dashboard));
/// router.start();
/// router.process_pending().await;
///
/// router.navigate("/dashboard", false);
/// router.process_pending().await;
/// assert_eq!(router.state(), RouteState::Active("/dashboard".into()));
/// ```
pub struct Router {
    routes: RwLock<BTreeMap<String, Arc<dyn Component>>>,
    app: AppContext,
    surface: Arc<dyn Surface>,
    state: RwLock<RouteState>,
    active: Mutex<Option<ActiveRoute>>,
    /// Held for the whole body of a transition.
    transition: tokio::sync::Mutex<()>,
    generation: Arc<AtomicU64>,
    events_tx: UnboundedSender<NavigationEvent>,
    events_rx: tokio::sync::Mutex<UnboundedReceiver<NavigationEvent>>,
}

impl Router {
    pub fn new(app: AppContext, surface: Arc<dyn Surface>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            routes: RwLock::new(BTreeMap::new()),
            app,
            surface,
            state: RwLock::new(RouteState::NoRoute),
            active: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
            generation: Arc::new(AtomicU64::new(0)),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    // ====================================================================
    // Route table
    // ====================================================================

    /// Register `component` under `path`. A second registration of the same
    /// path replaces the first.
    pub fn register(&self, path: &str, component: Arc<dyn Component>) {
        let path = normalize_path(path);
        let name = component.name().to_string();
        let previous = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), component);
        match previous {
            Some(old) => warn!(path, old = old.name(), new = name, "route re-registered"),
            None => debug!(path, component = name, "route registered"),
        }
    }

    /// Registered `(path, component name)` pairs, ordered by path.
    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(path, c)| (path.clone(), c.name().to_string()))
            .collect()
    }

    /// Whether some route is served by a component called `name`.
    pub fn has_component(&self, name: &str) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|c| c.name() == name)
    }

    /// The component for `path`, falling back to the default route.
    /// Returns the route path that matched alongside it.
    pub fn resolve(&self, path: &str) -> Option<(String, Arc<dyn Component>)> {
        let path = normalize_path(path);
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(component) = routes.get(&path) {
            return Some((path, Arc::clone(component)));
        }
        let default = normalize_path(&self.app.config().app.default_route);
        routes
            .get(&default)
            .map(|component| (default, Arc::clone(component)))
    }

    // ====================================================================
    // Introspection
    // ====================================================================

    pub fn state(&self) -> RouteState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Path of the active component, if any.
    pub fn current_path(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.path.clone())
    }

    /// Name of the active component, if any.
    pub fn current_component(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.component.name().to_string())
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    // ====================================================================
    // Event queue
    // ====================================================================

    /// Bind to the location and queue the initial `Load`.
    pub fn start(&self) {
        self.app
            .navigator()
            .location()
            .listen(self.events_tx.clone());
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.events_tx.send(NavigationEvent::Load);
    }

    /// Handle every queued navigation event, in order, including any queued
    /// while processing. Returns how many were handled.
    ///
    /// Returns 0 without waiting while another drain owns the queue, which
    /// is always the case once [`Router::run`] is spawned.
    pub async fn process_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            let event = {
                let Ok(mut rx) = self.events_rx.try_lock() else {
                    break;
                };
                match rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                }
            };
            self.handle_route_change(event).await;
            handled += 1;
        }
        handled
    }

    /// Handle navigation events as they arrive. Never returns while the
    /// router is alive; spawn it on its own task. While it runs,
    /// [`Router::process_pending`] is a no-op.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self.events_rx.lock().await;
        while let Some(event) = rx.recv().await {
            self.handle_route_change(event).await;
        }
    }

    // ====================================================================
    // Transitions
    // ====================================================================

    /// Resolve the location's current path and transition to it.
    pub async fn handle_route_change(&self, event: NavigationEvent) {
        let _guard = self.transition.lock().await;
        let path = self.app.navigator().current_path();
        debug!(?event, path, "route change");
        self.transition_to(path).await;
    }

    /// Re-run the transition for the current location.
    pub async fn retry(&self) {
        self.handle_route_change(NavigationEvent::HashChange).await;
    }

    /// Navigate to the default route. When already there, retry instead:
    /// pushing the same path emits nothing.
    pub async fn go_home(&self) {
        let home = normalize_path(&self.app.config().app.default_route);
        if self.app.navigator().current_path() == home {
            self.retry().await;
        } else {
            self.app.navigator().go_home();
        }
    }

    /// Write `path` to the location. The transition runs when the queued
    /// event is processed.
    pub fn navigate(&self, path: &str, replace: bool) {
        self.app.navigator().navigate(path, replace);
    }

    /// Go back one history entry. Returns `false` if there is none.
    pub fn back(&self) -> bool {
        self.app.navigator().back()
    }

    async fn transition_to(&self, path: String) {
        self.set_state(RouteState::Loading);

        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            self.teardown(previous).await;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = RouteToken::new(generation, Arc::clone(&self.generation));

        let Some((route, component)) = self.resolve(&path) else {
            warn!(path, "no route and no default route");
            self.surface.mount(&views::not_found_view(&path));
            self.surface
                .set_title(&format!("Not Found | {}", self.app.config().app.title));
            self.set_state(RouteState::Error(RouteFailure::NotFound(path)));
            return;
        };

        let ctx = Arc::new(ComponentContext::new(
            self.app.clone(),
            Arc::clone(&self.surface),
            token,
            path.clone(),
        ));
        match self.activate(&component, &ctx).await {
            Ok(()) => {
                self.commit(&path, &route, &component);
                *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveRoute {
                    path: path.clone(),
                    component,
                    ctx,
                });
                self.set_state(RouteState::Active(path));
            }
            Err(e) => {
                error!(path, component = component.name(), error = %e, "route failed");
                ctx.release();
                self.surface.mount(&views::error_view(&e.to_string()));
                self.set_state(RouteState::Error(RouteFailure::ComponentFailed(e)));
            }
        }
    }

    /// Render, mount, then init.
    async fn activate(
        &self,
        component: &Arc<dyn Component>,
        ctx: &Arc<ComponentContext>,
    ) -> Result<(), ComponentError> {
        let name = component.name().to_string();

        let markup = panic::catch_unwind(AssertUnwindSafe(|| component.render(ctx)))
            .map_err(|payload| ComponentError::new(&name, panic_message(payload.as_ref())))??;
        self.surface.mount(&markup);
        debug!(component = name, generation = ctx.token().generation(), "rendered");

        // Run init on its own task so a panic surfaces as a JoinError.
        let init = tokio::spawn({
            let component = Arc::clone(component);
            let ctx = Arc::clone(ctx);
            async move { component.init(&ctx).await }
        });
        match init.await {
            Ok(result) => result?,
            Err(join) if join.is_panic() => {
                return Err(ComponentError::new(
                    &name,
                    panic_message(join.into_panic().as_ref()),
                ));
            }
            Err(join) => return Err(ComponentError::new(&name, join.to_string())),
        }
        debug!(component = name, "initialized");
        Ok(())
    }

    async fn teardown(&self, previous: ActiveRoute) {
        let name = previous.component.name().to_string();
        if let Err(e) = previous.component.destroy().await {
            warn!(component = name, error = %e, "destroy failed");
        }
        let released = previous.ctx.release();
        debug!(component = name, released, "torn down");
    }

    fn commit(&self, path: &str, route: &str, component: &Arc<dyn Component>) {
        let config = self.app.config();
        let title = component
            .title()
            .unwrap_or_else(|| component.name().to_string());
        self.surface
            .set_title(&format!("{} | {}", title, config.app.title));
        if let Some(description) = component.description() {
            self.surface.set_description(&description);
        }
        self.surface.set_active_nav(route);
        self.app.store().set(CURRENT_ROUTE_KEY, path);
    }

    fn set_state(&self, state: RouteState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
