//! Argo Flux — headless application core for the ARGO ocean-data explorer.
//!
//! A reactive key-value store with pub/sub, a hash router that drives a
//! component lifecycle, and a bootstrapper that wires them to the backend.
//! Hosts (a browser shell, a terminal, tests) only supply the collaborators:
//! a [`Location`], a render [`Surface`], [`PersistentStorage`] and a
//! [`Backend`].
//!
//! # Three Primitives
//!
//! - `store.get(key)` / `store.set(key, value)` — read and commit state
//! - `store.subscribe(key | "*", handler)` — observe changes
//! - `navigator.navigate(path)` — change route; the router reacts
//!
//! # State Keys
//!
//! Flat string keys. The core writes a few itself:
//! - `language`, `online`, `apiConnected`, `systemStatus`
//! - `currentRoute` (after each successful transition)
//! - `notifications` (the visible notification list)
//!
//! # Example
//!
//! ```ignore
//! use argo_flux::{AppConfig, Bootstrap};
//!
//! let app = Bootstrap::new(AppConfig::load(path)?)
//!     .backend(backend)
//!     .route("/", Arc::new(Home))
//!     .route("/dashboard", Arc::new(Dashboard))
//!     .route("/chat", Arc::new(Chat))
//!     .route("/explorer", Arc::new(Explorer))
//!     .start()
//!     .await?;
//!
//! app.context().store().subscribe("apiConnected", |new, _, _| {
//!     println!("connected: {:?}", new);
//! });
//!
//! app.router().navigate("/dashboard", false);
//! app.router().process_pending().await;
//! ```

pub mod api;
pub mod app;
pub mod bootstrap;
pub mod component;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod i18n;
pub mod location;
pub mod notify;
pub mod router;
pub mod storage;
pub mod store;
pub mod surface;
pub mod value;
pub mod views;

// Re-export primary types at crate root.
pub use api::{ApiError, Backend, ErrorKind, Method, OfflineBackend, RequestOptions};
pub use app::{AppContext, Navigator};
pub use bootstrap::{App, Bootstrap};
pub use component::{Component, ComponentContext, Mount, RouteToken};
pub use config::AppConfig;
pub use error::{BootError, ComponentError, ConfigError, StorageError, StoreError, TranslationError};
pub use events::{GlobalEvent, GlobalEvents, KeyChord};
pub use history::HistoryRecord;
pub use i18n::{QueryParams, Translations};
pub use location::{Location, MemoryLocation, NavigationEvent};
pub use notify::{Notification, NotificationKind, Notifier};
pub use router::{RouteFailure, RouteState, Router};
pub use storage::{MemoryStorage, PersistentStorage, RedbStorage};
pub use store::{ChangeHandler, Computed, Store, Unsubscribe, WILDCARD};
pub use surface::{MemorySurface, Surface};
pub use value::{StateValue, SubscriptionId};
