//! The lifecycle contract between the router and a navigable view.
//!
//! A transition runs `destroy` on the outgoing component (awaited), then
//! `render` and `init` on the incoming one. Only `name` and `render` are
//! required; the other hooks default to no-ops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::app::AppContext;
use crate::error::ComponentError;
use crate::store::Unsubscribe;
use crate::surface::Surface;
use crate::value::StateValue;

#[async_trait::async_trait]
pub trait Component: Send + Sync + 'static {
    /// Stable name, used for start-up checks and logs.
    fn name(&self) -> &str;

    /// Page title shown while this component is active.
    fn title(&self) -> Option<String> {
        None
    }

    /// Meta description shown while this component is active.
    fn description(&self) -> Option<String> {
        None
    }

    /// Produce the component's markup. Replaces the mount point's content.
    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError>;

    /// Runs after the markup is mounted. May call the backend and write the
    /// store; late results should be checked against `ctx.token()`.
    async fn init(&self, _ctx: &ComponentContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Runs before the next component renders.
    async fn destroy(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

// ── RouteToken ──

/// Generation tag minted for every route transition.
///
/// Once the router moves on, every older token reports `is_current() ==
/// false`, so async work started by a previous component can tell its
/// result is stale and drop it.
#[derive(Debug, Clone)]
pub struct RouteToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl RouteToken {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// `Some(value)` while this token is current, `None` once stale.
    pub fn guard<T>(&self, value: T) -> Option<T> {
        self.is_current().then_some(value)
    }
}

// ── Mount ──

/// Handle to the page mount point, bound to one activation.
///
/// Cheap to clone into store handlers and spawned tasks. Writes are dropped
/// once the router has moved past the activation.
#[derive(Clone)]
pub struct Mount {
    token: RouteToken,
    surface: Arc<dyn Surface>,
}

impl Mount {
    /// Replace the page content. Returns `false` when the activation is stale.
    pub fn replace(&self, markup: &str) -> bool {
        if !self.token.is_current() {
            debug!(generation = self.token.generation(), "stale mount dropped");
            return false;
        }
        self.surface.mount(markup);
        true
    }
}

// ── ComponentContext ──

/// What a component sees during one activation.
pub struct ComponentContext {
    app: AppContext,
    token: RouteToken,
    path: String,
    mount: Mount,
    watchers: Mutex<Vec<Unsubscribe>>,
}

impl ComponentContext {
    pub fn new(
        app: AppContext,
        surface: Arc<dyn Surface>,
        token: RouteToken,
        path: impl Into<String>,
    ) -> Self {
        Self {
            app,
            mount: Mount {
                token: token.clone(),
                surface,
            },
            token,
            path: path.into(),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn token(&self) -> &RouteToken {
        &self.token
    }

    /// The location path that activated the component.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Subscribe to a store key for the lifetime of this activation. The
    /// router removes the subscription when the component is torn down.
    pub fn watch<F>(&self, key: &str, handler: F)
    where
        F: Fn(Option<&StateValue>, Option<&StateValue>, &str) + Send + Sync + 'static,
    {
        let handle = self.app.store().subscribe(key, handler);
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Re-mount fresh markup while this activation is current.
    pub fn mount(&self, markup: &str) -> bool {
        self.mount.replace(markup)
    }

    pub fn mount_handle(&self) -> Mount {
        self.mount.clone()
    }

    /// Re-mount the markup built by `render` every time `key` changes, for
    /// the lifetime of this activation.
    pub fn rerender_on<F>(&self, key: &str, render: F)
    where
        F: Fn(&AppContext) -> String + Send + Sync + 'static,
    {
        let mount = self.mount_handle();
        let app = self.app.clone();
        self.watch(key, move |_, _, _| {
            mount.replace(&render(&app));
        });
    }

    /// Write to the store only while this activation is current.
    /// Returns whether the write was applied.
    pub fn set_if_current(&self, key: &str, value: impl Into<StateValue>) -> bool {
        if !self.token.is_current() {
            return false;
        }
        self.app.store().set(key, value);
        true
    }

    /// Drop every subscription made through [`ComponentContext::watch`].
    pub(crate) fn release(&self) -> usize {
        let watchers: Vec<Unsubscribe> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for watcher in &watchers {
            watcher.unsubscribe();
        }
        watchers.len()
    }
}
