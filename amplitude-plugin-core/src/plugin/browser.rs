//! Browser adapter delegating to the vendor SDK.
//!
//! The SDK does its own batching, retry and device-id handling; this adapter
//! only decides how it is invoked. SDK instances come from an explicit
//! [`SdkRegistry`] keyed by project name, so several projects can be tracked
//! from one host process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::PluginConfig;
use crate::error::Result;
use crate::page_view::{EventLogger, PageViewTracker};
use crate::types::{IdentifyPayload, PagePayload, Properties, TrackPayload};

use super::{AdapterState, AnalyticsPlugin, InitContext, Lifecycle, ANONYMOUS_ID_KEY};

/// Instance name used when no project name is configured.
pub const DEFAULT_INSTANCE: &str = "$default_instance";

/// Invoked by the SDK once its asynchronous init has completed.
pub type InitCallback = Box<dyn FnOnce() + Send + 'static>;

/// The subset of the Amplitude browser SDK this adapter drives.
pub trait AmplitudeSdk: Send + Sync {
    fn init(
        &self,
        api_key: &str,
        user_id: Option<&str>,
        options: Option<&Value>,
        on_complete: InitCallback,
    );
    fn set_device_id(&self, device_id: &str);
    fn set_user_id(&self, user_id: Option<&str>);
    /// Replace the user's properties with `properties`.
    fn set_user_properties(&self, properties: &Properties);
    fn log_event(&self, event_type: &str, properties: &Properties);
}

type SdkFactory = Box<dyn Fn(&str) -> Arc<dyn AmplitudeSdk> + Send + Sync>;

/// Project-name to SDK-instance registry.
///
/// Instances are created on first use and live as long as the registry.
/// Names are case-insensitive.
pub struct SdkRegistry {
    factory: SdkFactory,
    instances: Mutex<HashMap<String, Arc<dyn AmplitudeSdk>>>,
}

impl SdkRegistry {
    /// Create a registry that builds instances with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn AmplitudeSdk> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Return the instance for `project_name`, creating it if needed.
    pub fn get_instance(&self, project_name: Option<&str>) -> Arc<dyn AmplitudeSdk> {
        let name = project_name
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_INSTANCE)
            .to_lowercase();

        let mut instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        instances
            .entry(name)
            .or_insert_with_key(|name| (self.factory)(name.as_str()))
            .clone()
    }

    /// Names of the instances created so far
    pub fn instance_names(&self) -> Vec<String> {
        let instances = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = instances.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Exposes an SDK instance as an [`EventLogger`] for page views.
struct SdkLogger(Arc<dyn AmplitudeSdk>);

#[async_trait]
impl EventLogger for SdkLogger {
    async fn log_event(&self, event_type: &str, properties: Properties) -> Result<()> {
        self.0.log_event(event_type, &properties);
        Ok(())
    }
}

struct BrowserHandles {
    sdk: Arc<dyn AmplitudeSdk>,
    pages: PageViewTracker,
}

/// Amplitude plugin backed by the vendor SDK.
pub struct BrowserPlugin {
    config: PluginConfig,
    registry: Arc<SdkRegistry>,
    state: AdapterState<BrowserHandles>,
}

impl BrowserPlugin {
    /// Create an uninitialized plugin resolving SDK instances from `registry`.
    ///
    /// Fails if the API key is missing or `options` is not an object.
    pub fn new(config: PluginConfig, registry: Arc<SdkRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            state: AdapterState::Uninitialized,
        })
    }

    /// Direct access to the SDK instance, once initialized.
    pub fn sdk(&self) -> Option<Arc<dyn AmplitudeSdk>> {
        self.state.handle().ok().map(|h| h.sdk.clone())
    }
}

#[async_trait]
impl AnalyticsPlugin for BrowserPlugin {
    fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn initialize(&mut self, ctx: InitContext<'_>) -> Result<()> {
        self.state.ensure_uninitialized()?;
        let api_key = ctx.config.validate()?;

        let sdk = self.registry.get_instance(ctx.config.project_name.as_deref());

        let ready = Arc::new(AtomicBool::new(false));
        let signal = ready.clone();
        sdk.init(
            api_key,
            None,
            ctx.config.options_object(),
            Box::new(move || {
                signal.store(true, Ordering::Release);
                tracing::debug!("Amplitude SDK init completed");
            }),
        );

        // Does not wait for init to complete.
        if let Some(device_id) = ctx.instance.user(ANONYMOUS_ID_KEY) {
            sdk.set_device_id(&device_id);
        }

        let pages = PageViewTracker::new(Arc::new(SdkLogger(sdk.clone())));
        self.state = AdapterState::initializing(BrowserHandles { sdk, pages }, ready);
        Ok(())
    }

    async fn page(&self, payload: PagePayload) -> Result<()> {
        self.state.handle()?.pages.page(payload).await
    }

    async fn track(&self, payload: TrackPayload) -> Result<()> {
        let sdk = &self.state.handle()?.sdk;
        sdk.log_event(&payload.event, &payload.properties);
        Ok(())
    }

    async fn identify(&self, payload: IdentifyPayload) -> Result<()> {
        let sdk = &self.state.handle()?.sdk;
        sdk.set_user_id(payload.user_id.as_deref());
        sdk.set_user_properties(&payload.traits);
        Ok(())
    }

    fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::plugin::StaticInstance;
    use crate::types::PageOptions;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Init {
            api_key: String,
            options: Option<Value>,
        },
        SetDeviceId(String),
        SetUserId(Option<String>),
        SetUserProperties(Properties),
        LogEvent(String, Properties),
    }

    #[derive(Default)]
    struct FakeSdk {
        calls: Mutex<Vec<Call>>,
        pending_init: Mutex<Option<InitCallback>>,
    }

    impl FakeSdk {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn complete_init(&self) {
            if let Some(callback) = self.pending_init.lock().unwrap().take() {
                callback();
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AmplitudeSdk for FakeSdk {
        fn init(
            &self,
            api_key: &str,
            user_id: Option<&str>,
            options: Option<&Value>,
            on_complete: InitCallback,
        ) {
            assert!(user_id.is_none());
            self.record(Call::Init {
                api_key: api_key.to_string(),
                options: options.cloned(),
            });
            *self.pending_init.lock().unwrap() = Some(on_complete);
        }

        fn set_device_id(&self, device_id: &str) {
            self.record(Call::SetDeviceId(device_id.to_string()));
        }

        fn set_user_id(&self, user_id: Option<&str>) {
            self.record(Call::SetUserId(user_id.map(str::to_string)));
        }

        fn set_user_properties(&self, properties: &Properties) {
            self.record(Call::SetUserProperties(properties.clone()));
        }

        fn log_event(&self, event_type: &str, properties: &Properties) {
            self.record(Call::LogEvent(event_type.to_string(), properties.clone()));
        }
    }

    struct Fixture {
        registry: Arc<SdkRegistry>,
        created: Arc<Mutex<Vec<Arc<FakeSdk>>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let created: Arc<Mutex<Vec<Arc<FakeSdk>>>> = Arc::default();
            let sink = created.clone();
            let registry = Arc::new(SdkRegistry::new(move |_name| {
                let sdk = Arc::new(FakeSdk::default());
                sink.lock().unwrap().push(sdk.clone());
                sdk as Arc<dyn AmplitudeSdk>
            }));
            Self { registry, created }
        }

        fn sdk(&self, index: usize) -> Arc<FakeSdk> {
            self.created.lock().unwrap()[index].clone()
        }

        fn sdk_count(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn initialized(fixture: &Fixture, config: PluginConfig) -> BrowserPlugin {
        let mut plugin = BrowserPlugin::new(config.clone(), fixture.registry.clone()).unwrap();
        let instance = StaticInstance::new("anon-1");
        plugin
            .initialize(InitContext {
                config: &config,
                instance: &instance,
            })
            .unwrap();
        plugin
    }

    #[test]
    fn test_invalid_config_never_touches_sdk() {
        let fixture = Fixture::new();

        assert!(matches!(
            BrowserPlugin::new(PluginConfig::default(), fixture.registry.clone()),
            Err(Error::Config(_))
        ));

        let mut bad = PluginConfig::with_api_key("key");
        bad.options = Some(json!("nope"));
        assert!(BrowserPlugin::new(bad.clone(), fixture.registry.clone()).is_err());

        let mut plugin =
            BrowserPlugin::new(PluginConfig::with_api_key("key"), fixture.registry.clone())
                .unwrap();
        let instance = StaticInstance::new("anon-1");
        assert!(plugin
            .initialize(InitContext {
                config: &bad,
                instance: &instance,
            })
            .is_err());

        assert_eq!(fixture.sdk_count(), 0);
        assert_eq!(plugin.lifecycle(), Lifecycle::Uninitialized);
    }

    #[test]
    fn test_initialize_waits_for_sdk_completion() {
        let fixture = Fixture::new();
        let mut config = PluginConfig::with_api_key("key");
        config.options = Some(json!({"includeUtm": true}));

        let plugin = initialized(&fixture, config);
        assert_eq!(plugin.lifecycle(), Lifecycle::Initializing);
        assert!(!plugin.loaded());

        let sdk = fixture.sdk(0);
        assert_eq!(
            sdk.calls(),
            vec![
                Call::Init {
                    api_key: "key".to_string(),
                    options: Some(json!({"includeUtm": true})),
                },
                Call::SetDeviceId("anon-1".to_string()),
            ]
        );

        sdk.complete_init();
        assert!(plugin.loaded());
        assert_eq!(plugin.lifecycle(), Lifecycle::Ready);
    }

    #[tokio::test]
    async fn test_hooks_delegate_to_sdk() {
        let fixture = Fixture::new();
        let plugin = initialized(&fixture, PluginConfig::with_api_key("key"));
        let sdk = fixture.sdk(0);

        plugin
            .identify(IdentifyPayload {
                user_id: Some("user-1".to_string()),
                traits: props(json!({"plan": "pro"})),
            })
            .await
            .unwrap();
        plugin
            .track(TrackPayload {
                event: "Clicked".to_string(),
                properties: props(json!({"button": "buy"})),
                ..Default::default()
            })
            .await
            .unwrap();
        plugin
            .page(PagePayload {
                properties: props(json!({"path": "/home"})),
                options: Some(PageOptions {
                    event_type: Some("Home".to_string()),
                }),
            })
            .await
            .unwrap();

        let calls = sdk.calls();
        assert_eq!(
            &calls[2..],
            &[
                Call::SetUserId(Some("user-1".to_string())),
                Call::SetUserProperties(props(json!({"plan": "pro"}))),
                Call::LogEvent("Clicked".to_string(), props(json!({"button": "buy"}))),
                Call::LogEvent("Home".to_string(), props(json!({"path": "/home"}))),
            ]
        );
    }

    #[tokio::test]
    async fn test_hooks_before_initialize_are_not_ready() {
        let fixture = Fixture::new();
        let plugin =
            BrowserPlugin::new(PluginConfig::with_api_key("key"), fixture.registry.clone())
                .unwrap();
        assert!(matches!(
            plugin.track(TrackPayload::default()).await,
            Err(Error::NotReady)
        ));
        assert!(plugin.sdk().is_none());
    }

    #[test]
    fn test_registry_keys_by_project_name() {
        let fixture = Fixture::new();

        let mut first = PluginConfig::with_api_key("key-a");
        first.project_name = Some("Marketing".to_string());
        let mut second = PluginConfig::with_api_key("key-b");
        second.project_name = Some("marketing".to_string());

        let a = initialized(&fixture, first);
        let b = initialized(&fixture, second);
        let c = initialized(&fixture, PluginConfig::with_api_key("key-c"));

        assert_eq!(fixture.sdk_count(), 2);
        assert!(Arc::ptr_eq(&a.sdk().unwrap(), &b.sdk().unwrap()));
        assert!(!Arc::ptr_eq(&a.sdk().unwrap(), &c.sdk().unwrap()));
        assert_eq!(
            fixture.registry.instance_names(),
            vec![DEFAULT_INSTANCE.to_string(), "marketing".to_string()]
        );
    }
}
