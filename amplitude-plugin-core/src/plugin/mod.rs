//! Plugin adapters for the host analytics framework
//!
//! The host constructs a plugin with its configuration, calls
//! [`initialize`](AnalyticsPlugin::initialize) once, then calls
//! `identify` / `track` / `page` any number of times. It polls
//! [`loaded`](AnalyticsPlugin::loaded) before assuming events reach Amplitude.
//!
//! ## Lifecycle
//!
//! ```text
//!  Uninitialized ──initialize()──▶ Initializing ──client ready──▶ Ready
//! ```
//!
//! The server adapter goes straight to `Ready`. The browser adapter stays in
//! `Initializing` until the SDK reports that its own init completed. Hooks
//! called while `Uninitialized` fail with [`Error::NotReady`].
//!
//! ## Variants
//!
//! - [`ServerPlugin`]: talks to the HTTP API through an [`EventClient`](crate::client::EventClient)
//! - [`BrowserPlugin`]: delegates to a vendor SDK behind the [`AmplitudeSdk`] trait

mod browser;
mod server;

pub use browser::{AmplitudeSdk, BrowserPlugin, InitCallback, SdkRegistry, DEFAULT_INSTANCE};
pub use server::ServerPlugin;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::types::{IdentifyPayload, PagePayload, TrackPayload};

/// Name under which the plugin registers with the host.
pub const PLUGIN_NAME: &str = "amplitude";

/// Key of the host's anonymous identity.
pub const ANONYMOUS_ID_KEY: &str = "anonymousId";

/// The host's view of the current user, queried at initialization.
pub trait HostInstance: Send + Sync {
    /// Look up a user attribute, e.g. [`ANONYMOUS_ID_KEY`].
    fn user(&self, key: &str) -> Option<String>;
}

/// Host instance that only knows a fixed anonymous id.
#[derive(Debug, Clone, Default)]
pub struct StaticInstance {
    anonymous_id: Option<String>,
}

impl StaticInstance {
    pub fn new(anonymous_id: impl Into<String>) -> Self {
        Self {
            anonymous_id: Some(anonymous_id.into()),
        }
    }
}

impl HostInstance for StaticInstance {
    fn user(&self, key: &str) -> Option<String> {
        match key {
            ANONYMOUS_ID_KEY => self.anonymous_id.clone(),
            _ => None,
        }
    }
}

/// Arguments of [`AnalyticsPlugin::initialize`].
#[derive(Clone, Copy)]
pub struct InitContext<'a> {
    pub config: &'a PluginConfig,
    pub instance: &'a dyn HostInstance,
}

/// Observable adapter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
}

/// Contract between the host framework and an analytics plugin.
///
/// Event hooks resolve once the underlying call has completed. Hosts that
/// want fire-and-forget semantics queue the returned future on a
/// [`Dispatcher`](crate::delivery::Dispatcher), which keeps calls in order.
#[async_trait]
pub trait AnalyticsPlugin: Send + Sync {
    /// Plugin identifier.
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// Configuration as supplied at construction.
    fn config(&self) -> &PluginConfig;

    /// Validate `ctx.config` and create the underlying client.
    ///
    /// Configuration errors are returned before any network or SDK call.
    fn initialize(&mut self, ctx: InitContext<'_>) -> Result<()>;

    /// Report a page view.
    async fn page(&self, payload: PagePayload) -> Result<()>;

    /// Report a named event.
    async fn track(&self, payload: TrackPayload) -> Result<()>;

    /// Associate a user id and traits with the session.
    async fn identify(&self, payload: IdentifyPayload) -> Result<()>;

    /// Current lifecycle state.
    fn lifecycle(&self) -> Lifecycle;

    /// Whether the underlying client has finished initializing.
    fn loaded(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }
}

/// Adapter state owning the client handle once initialization has started.
pub(crate) enum AdapterState<H> {
    Uninitialized,
    Active { handle: H, ready: Arc<AtomicBool> },
}

impl<H> AdapterState<H> {
    /// Active state whose readiness is signalled later through `ready`.
    pub(crate) fn initializing(handle: H, ready: Arc<AtomicBool>) -> Self {
        AdapterState::Active { handle, ready }
    }

    /// Active state that is ready immediately.
    pub(crate) fn ready(handle: H) -> Self {
        AdapterState::Active {
            handle,
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        match self {
            AdapterState::Uninitialized => Lifecycle::Uninitialized,
            AdapterState::Active { ready, .. } if ready.load(Ordering::Acquire) => {
                Lifecycle::Ready
            }
            AdapterState::Active { .. } => Lifecycle::Initializing,
        }
    }

    pub(crate) fn handle(&self) -> Result<&H> {
        match self {
            AdapterState::Uninitialized => Err(Error::NotReady),
            AdapterState::Active { handle, .. } => Ok(handle),
        }
    }

    pub(crate) fn ensure_uninitialized(&self) -> Result<()> {
        match self {
            AdapterState::Uninitialized => Ok(()),
            AdapterState::Active { .. } => Err(Error::AlreadyInitialized),
        }
    }
}
