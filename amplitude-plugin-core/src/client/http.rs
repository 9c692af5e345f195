//! HTTP client for the Amplitude HTTP API v2
//!
//! This client reports data for a single user: it owns that user's
//! [`UserContext`] and the user properties merged into every event.
//!
//! See
//! - <https://developers.amplitude.com/docs/http-api-v2>
//! - <https://developers.amplitude.com/docs/identify-api>

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::page_view::EventLogger;
use crate::types::{Properties, UserContext};

use super::events::{EventPayload, Identification};

const IDENTIFY_PATH: &str = "identify";
const EVENTS_PATH: &str = "2/httpapi";

/// Everything needed to construct an [`EventClient`].
#[derive(Debug, Clone)]
pub struct EventClientConfig {
    /// Fully-qualified base URL; request paths are appended verbatim
    pub base_url: String,
    /// Project API key
    pub api_key: String,
    /// Identity reported with every request
    pub user_context: UserContext,
    /// Extra headers sent on every request
    pub http_headers: Option<BTreeMap<String, String>>,
    /// Forwarded as `options` in the ingestion body
    pub event_options: Option<Value>,
    /// Merged into every event as `user_properties`
    pub user_properties: Option<Properties>,
}

/// Amplitude client speaking HTTP API v2.
///
/// Cloning is cheap; clones share the HTTP connection pool and the user context.
#[derive(Clone)]
pub struct EventClient {
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    event_options: Option<Value>,
    user_properties: Option<Properties>,
    user: RwLock<UserContext>,
}

impl EventClient {
    /// Create a new client
    ///
    /// Returns an error if the base URL or API key is empty, or if a
    /// configured header is not a valid HTTP header.
    pub fn new(config: EventClientConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config("base URL is required".to_string()));
        }
        if config.api_key.is_empty() {
            return Err(Error::Config(
                "Amplitude project API key is not defined".to_string(),
            ));
        }

        let headers = build_headers(config.http_headers.as_ref())?;

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http_client,
                base_url: config.base_url,
                api_key: config.api_key,
                event_options: config.event_options,
                user_properties: config.user_properties,
                user: RwLock::new(config.user_context),
            }),
        })
    }

    /// Base URL request paths are appended to
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Snapshot of the current identity
    pub async fn user_context(&self) -> UserContext {
        self.inner.user.read().await.clone()
    }

    /// Set or clear the user id reported by subsequent calls.
    pub async fn set_user_id(&self, user_id: Option<String>) {
        self.inner.user.write().await.user_id = user_id;
    }

    /// Send an identify call that `$set`s `traits` on the user.
    ///
    /// `user_id` overrides the stored user id for this call only.
    pub async fn identify(&self, user_id: Option<String>, traits: Properties) -> Result<()> {
        let identification = {
            let user = self.inner.user.read().await;
            Identification::new(&user, user_id, traits)
        };
        let encoded = identification.encode()?;

        let url = self.endpoint(IDENTIFY_PATH);
        tracing::debug!(%url, "Sending identify to Amplitude");

        let response = self
            .inner
            .http_client
            .post(&url)
            .form(&[
                ("api_key", self.inner.api_key.as_str()),
                ("identification", encoded.as_str()),
            ])
            .send()
            .await?;

        check_response(response).await
    }

    /// Send a batch of events in a single request.
    pub async fn send_events(&self, events: &[EventPayload]) -> Result<()> {
        let url = self.endpoint(EVENTS_PATH);
        tracing::debug!(%url, events = events.len(), "Sending events to Amplitude");

        let body = SendEventsRequest {
            api_key: &self.inner.api_key,
            events,
            options: self.inner.event_options.as_ref(),
        };

        let response = self
            .inner
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        check_response(response).await
    }

    /// Compose one event from the client's state and send it.
    ///
    /// `payload_base` is merged over the stored user properties; identity
    /// always comes from the client's own context.
    pub async fn log_event(
        &self,
        event_type: &str,
        properties: Option<Properties>,
        payload_base: Option<Properties>,
    ) -> Result<()> {
        let event = {
            let user = self.inner.user.read().await;
            EventPayload::compose(
                self.inner.user_properties.as_ref(),
                payload_base,
                &user,
                event_type,
                properties,
            )
        };

        self.send_events(std::slice::from_ref(&event)).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }
}

#[async_trait]
impl EventLogger for EventClient {
    async fn log_event(&self, event_type: &str, properties: Properties) -> Result<()> {
        EventClient::log_event(self, event_type, Some(properties), None).await
    }
}

/// Request body for POST 2/httpapi
#[derive(Serialize)]
struct SendEventsRequest<'a> {
    api_key: &'a str,
    events: &'a [EventPayload],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a Value>,
}

fn build_headers(headers: Option<&BTreeMap<String, String>>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.into_iter().flatten() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| {
                Error::Config(format!("invalid value for header {}: {}", name.as_str(), e))
            })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Map an HTTP response to the success/failure contract: only 200 succeeds.
async fn check_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());

    Err(Error::Protocol {
        status: status.as_u16(),
        details: describe_body(&body),
    })
}

/// Render a response body for an error message: structured JSON is
/// re-serialized compactly, anything else is kept as raw text.
fn describe_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(text)) => text,
        Ok(value) => value.to_string(),
        Err(_) => body.to_string(),
    }
}
