//! Server-side adapter driving the Amplitude HTTP API directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{resolve_base_url, EventClient, EventClientConfig};
use crate::config::{PluginConfig, ServerOptions};
use crate::error::Result;
use crate::page_view::PageViewTracker;
use crate::types::{IdentifyPayload, PagePayload, Properties, TrackPayload, UserContext};

use super::{AdapterState, AnalyticsPlugin, HostInstance, InitContext, Lifecycle, ANONYMOUS_ID_KEY};

struct ServerHandles {
    client: EventClient,
    pages: PageViewTracker,
}

/// Amplitude plugin for environments without the vendor SDK.
///
/// One plugin reports for one session: the device id is fixed at
/// initialization and `identify` sets the user id for later events.
pub struct ServerPlugin {
    config: PluginConfig,
    state: AdapterState<ServerHandles>,
}

impl ServerPlugin {
    /// Create an uninitialized plugin.
    ///
    /// Fails if the API key is missing or `options` is not an object.
    pub fn new(config: PluginConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: AdapterState::Uninitialized,
        })
    }

    /// The underlying client, once initialized.
    pub fn client(&self) -> Option<&EventClient> {
        self.state.handle().ok().map(|h| &h.client)
    }
}

#[async_trait]
impl AnalyticsPlugin for ServerPlugin {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn initialize(&mut self, ctx: InitContext<'_>) -> Result<()> {
        self.state.ensure_uninitialized()?;

        let api_key = ctx.config.validate()?;
        let options = ServerOptions::from_plugin_config(ctx.config)?;
        let base_url = resolve_base_url(options.api_endpoint.as_deref());

        let client = EventClient::new(EventClientConfig {
            base_url,
            api_key: api_key.to_string(),
            user_context: UserContext::anonymous(device_id(ctx.instance)),
            http_headers: options.http_headers,
            event_options: options.event_options,
            user_properties: None,
        })?;
        let pages = PageViewTracker::new(Arc::new(client.clone()));

        tracing::info!(base_url = %client.base_url(), "Amplitude server plugin initialized");

        self.state = AdapterState::ready(ServerHandles { client, pages });
        Ok(())
    }

    async fn page(&self, payload: PagePayload) -> Result<()> {
        self.state.handle()?.pages.page(payload).await
    }

    async fn track(&self, payload: TrackPayload) -> Result<()> {
        let client = &self.state.handle()?.client;

        // Amplitude only accepts an object here; anything else is ignored.
        let payload_base = payload
            .options
            .user_properties
            .filter(Value::is_object)
            .map(|user_properties| {
                let mut base = Properties::new();
                base.insert("user_properties".to_string(), user_properties);
                base
            });

        client
            .log_event(&payload.event, Some(payload.properties), payload_base)
            .await
    }

    async fn identify(&self, payload: IdentifyPayload) -> Result<()> {
        let client = &self.state.handle()?.client;

        client.set_user_id(payload.user_id.clone()).await;
        client.identify(payload.user_id, payload.traits).await
    }

    fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }
}

/// The host's anonymous id, or a fresh one when the host has none.
fn device_id(instance: &dyn HostInstance) -> String {
    match instance.user(ANONYMOUS_ID_KEY) {
        Some(id) if !id.is_empty() => id,
        _ => {
            let generated = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                device_id = %generated,
                "Host supplied no anonymous id; generated a device id"
            );
            generated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::plugin::StaticInstance;
    use serde_json::json;

    fn plugin_config(options: Option<Value>) -> PluginConfig {
        PluginConfig {
            api_key: Some("key".to_string()),
            project_name: None,
            options,
        }
    }

    fn init(plugin: &mut ServerPlugin, config: &PluginConfig, anon: &str) -> Result<()> {
        let instance = StaticInstance::new(anon);
        plugin.initialize(InitContext {
            config,
            instance: &instance,
        })
    }

    #[test]
    fn test_new_rejects_missing_api_key() {
        assert!(matches!(
            ServerPlugin::new(PluginConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_name_and_config_introspection() {
        let config = plugin_config(Some(json!({"apiEndpoint": "api.eu.amplitude.com"})));
        let plugin = ServerPlugin::new(config.clone()).unwrap();
        assert_eq!(plugin.name(), "amplitude");
        assert_eq!(plugin.config(), &config);
        assert_eq!(plugin.lifecycle(), Lifecycle::Uninitialized);
        assert!(!plugin.loaded());
    }

    #[test]
    fn test_initialize_resolves_endpoint_and_is_ready() {
        let config = plugin_config(Some(json!({"apiEndpoint": "api.eu.amplitude.com"})));
        let mut plugin = ServerPlugin::new(config.clone()).unwrap();
        init(&mut plugin, &config, "anon-1").unwrap();

        assert!(plugin.loaded());
        let client = plugin.client().unwrap();
        assert_eq!(client.base_url(), "https://api.eu.amplitude.com/");
    }

    #[test]
    fn test_initialize_default_endpoint() {
        let config = plugin_config(None);
        let mut plugin = ServerPlugin::new(config.clone()).unwrap();
        init(&mut plugin, &config, "anon-1").unwrap();
        assert_eq!(
            plugin.client().unwrap().base_url(),
            "https://api.amplitude.com/"
        );
    }

    #[test]
    fn test_initialize_validates_context_config() {
        let mut plugin = ServerPlugin::new(plugin_config(None)).unwrap();

        let bad = PluginConfig {
            options: Some(json!(42)),
            ..plugin_config(None)
        };
        assert!(init(&mut plugin, &bad, "anon-1").is_err());
        assert_eq!(plugin.lifecycle(), Lifecycle::Uninitialized);
        assert!(plugin.client().is_none());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let config = plugin_config(None);
        let mut plugin = ServerPlugin::new(config.clone()).unwrap();
        init(&mut plugin, &config, "anon-1").unwrap();
        assert!(matches!(
            init(&mut plugin, &config, "anon-2"),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_hooks_before_initialize_are_not_ready() {
        let plugin = ServerPlugin::new(plugin_config(None)).unwrap();

        assert!(matches!(
            plugin.track(TrackPayload::default()).await,
            Err(Error::NotReady)
        ));
        assert!(matches!(
            plugin.page(PagePayload::default()).await,
            Err(Error::NotReady)
        ));
        assert!(matches!(
            plugin.identify(IdentifyPayload::default()).await,
            Err(Error::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_device_id_seeded_from_host() {
        let config = plugin_config(None);
        let mut plugin = ServerPlugin::new(config.clone()).unwrap();
        init(&mut plugin, &config, "anon-42").unwrap();

        let ctx = plugin.client().unwrap().user_context().await;
        assert_eq!(ctx.device_id, "anon-42");
        assert!(ctx.user_id.is_none());
    }

    #[test]
    fn test_device_id_generated_when_host_has_none() {
        let id = device_id(&StaticInstance::default());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
