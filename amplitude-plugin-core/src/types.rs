//! Domain types shared by the Amplitude client and the plugin adapters
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Host** | The analytics-dispatch framework that owns the plugin and calls its hooks |
//! | **Device id** | Host-generated anonymous identifier, stable for the session |
//! | **User id** | Application user identifier, set by `identify` once the user is known |
//! | **Traits** | Per-call user properties supplied to `identify` (sent with `$set`) |
//! | **Event** | A named occurrence with optional properties |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form property mapping used for event properties, traits and user properties.
pub type Properties = serde_json::Map<String, Value>;

/// Identity the client reports with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Known application user, if any
    pub user_id: Option<String>,
    /// Anonymous identity assigned at initialization
    pub device_id: String,
}

impl UserContext {
    /// Create a context for an anonymous device with no user yet.
    pub fn anonymous(device_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            device_id: device_id.into(),
        }
    }
}

// ============================================
// Host payloads
// ============================================

/// Payload of the host's `track` hook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    /// Event name
    pub event: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub options: TrackOptions,
}

/// Call-site options understood by `track`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOptions {
    /// User properties that accompany this single event only
    #[serde(default)]
    pub user_properties: Option<Value>,
}

/// Payload of the host's `page` hook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub options: Option<PageOptions>,
}

/// Call-site options understood by `page`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOptions {
    /// Event name to log instead of the default page-view name
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Payload of the host's `identify` hook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    /// New user id; `None` clears the current one
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub traits: Properties,
}
