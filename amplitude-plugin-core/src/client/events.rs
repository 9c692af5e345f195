//! Wire payloads for the Amplitude HTTP API v2
//!
//! - [`EventPayload`]: one element of the `events` array posted to `2/httpapi`
//! - [`Identification`]: the document sent (base64 JSON) to the `identify` endpoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Properties, UserContext};

/// Single event as accepted by `POST 2/httpapi`.
///
/// Constructed fresh for every call and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_properties: Option<Properties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<Value>,

    /// Any other event fields carried in from a payload base
    #[serde(flatten)]
    pub extra: Properties,
}

impl EventPayload {
    /// Compose an event from the client's state and the call's arguments.
    ///
    /// Layering, last write wins:
    /// 1. `stored_user_properties`
    /// 2. `payload_base` (e.g. a one-shot `user_properties` override)
    /// 3. `user_id` / `device_id` from `user`, always, even when absent
    /// 4. `event_type` and `event_properties`, when non-empty
    pub fn compose(
        stored_user_properties: Option<&Properties>,
        payload_base: Option<Properties>,
        user: &UserContext,
        event_type: &str,
        properties: Option<Properties>,
    ) -> Self {
        let mut payload = EventPayload {
            user_properties: stored_user_properties.map(|p| Value::Object(p.clone())),
            ..Default::default()
        };

        if let Some(mut base) = payload_base {
            if let Some(user_properties) = base.remove("user_properties") {
                payload.user_properties = Some(user_properties);
            }
            if let Some(Value::String(event_type)) = base.remove("event_type") {
                payload.event_type = Some(event_type);
            }
            if let Some(Value::Object(props)) = base.remove("event_properties") {
                payload.event_properties = Some(props);
            }
            // Identity is never taken from the base.
            base.remove("user_id");
            base.remove("device_id");
            payload.extra = base;
        }

        payload.user_id = user.user_id.clone();
        payload.device_id = Some(user.device_id.clone());

        if !event_type.is_empty() {
            payload.event_type = Some(event_type.to_string());
        }
        if let Some(props) = properties.filter(|p| !p.is_empty()) {
            payload.event_properties = Some(props);
        }

        payload
    }
}

/// User property operations of an identify call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPropertyOperations {
    /// Replace the listed properties
    #[serde(rename = "$set")]
    pub set: Properties,
}

/// Document carried in the `identification` form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    pub user_properties: UserPropertyOperations,
}

impl Identification {
    /// Build an identification from the client's context.
    ///
    /// `user_id` overrides the context's user id when provided.
    pub fn new(user: &UserContext, user_id: Option<String>, traits: Properties) -> Self {
        Self {
            user_id: user_id.or_else(|| user.user_id.clone()),
            device_id: Some(user.device_id.clone()),
            user_properties: UserPropertyOperations { set: traits },
        }
    }

    /// JSON-encode then base64-encode for the form body.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }
}
