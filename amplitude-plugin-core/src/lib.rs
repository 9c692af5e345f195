//! # amplitude-plugin-core
//!
//! Amplitude plugin for a generic analytics-dispatch host.
//!
//! This library provides:
//! - [`EventClient`]: an Amplitude HTTP API v2 client (identify + event ingestion)
//! - [`PageViewTracker`]: page views translated into named events
//! - [`ServerPlugin`] / [`BrowserPlugin`]: the host's plugin contract, backed by
//!   the HTTP client or by the vendor SDK
//! - Configuration management, logging infrastructure and detached delivery
//!
//! ## Example
//!
//! ```rust,no_run
//! use amplitude_plugin_core::plugin::{AnalyticsPlugin, InitContext, StaticInstance};
//! use amplitude_plugin_core::{PluginConfig, ServerPlugin, TrackPayload};
//!
//! # async fn run() -> amplitude_plugin_core::Result<()> {
//! let config = PluginConfig::with_api_key("project-key");
//! let mut plugin = ServerPlugin::new(config.clone())?;
//! plugin.initialize(InitContext {
//!     config: &config,
//!     instance: &StaticInstance::new("anonymous-id"),
//! })?;
//!
//! plugin
//!     .track(TrackPayload {
//!         event: "Signed Up".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::{EventClient, EventClientConfig, EventPayload};
pub use config::{Config, PluginConfig, ServerOptions};
pub use error::{Error, Result};
pub use page_view::{EventLogger, PageViewTracker, DEFAULT_PAGE_EVENT};
pub use plugin::{AnalyticsPlugin, BrowserPlugin, Lifecycle, ServerPlugin};
pub use types::*;

// Public modules
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod page_view;
pub mod plugin;
pub mod types;
