//! Shared page view tracking
//!
//! Both adapters report page views the same way: as a single named event
//! logged through whichever client is in effect.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PagePayload, Properties};

/// Event name used for page views unless the caller overrides it.
pub const DEFAULT_PAGE_EVENT: &str = "Page View";

/// The single event-logging operation a client exposes.
///
/// Implemented by [`EventClient`](crate::client::EventClient) and by the
/// browser SDK handle.
#[async_trait]
pub trait EventLogger: Send + Sync {
    /// Log one event with its properties.
    async fn log_event(&self, event_type: &str, properties: Properties) -> Result<()>;
}

/// Translates page views into events on a bound client.
#[derive(Clone)]
pub struct PageViewTracker {
    client: Arc<dyn EventLogger>,
}

impl PageViewTracker {
    pub fn new(client: Arc<dyn EventLogger>) -> Self {
        Self { client }
    }

    /// Log a page view as `options.eventType`, or [`DEFAULT_PAGE_EVENT`] when
    /// that is absent or empty.
    pub async fn page(&self, payload: PagePayload) -> Result<()> {
        let event_type = payload
            .options
            .and_then(|o| o.event_type)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_PAGE_EVENT.to_string());

        self.client.log_event(&event_type, payload.properties).await
    }
}
