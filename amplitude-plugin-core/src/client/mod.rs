//! Amplitude HTTP API v2 client
//!
//! Used by the server adapter, where no vendor SDK is available. The client
//! speaks the two endpoints needed to report a single user:
//!
//! - `POST {base}identify`: form body with `api_key` and a base64 JSON
//!   `identification` document
//! - `POST {base}2/httpapi`: JSON body `{api_key, events, options}`
//!
//! There is no batching across calls and no retry: one call is one request,
//! and only HTTP 200 counts as success.

mod endpoint;
mod events;
mod http;

pub use endpoint::{resolve_base_url, DEFAULT_API_ENDPOINT};
pub use events::{EventPayload, Identification, UserPropertyOperations};
pub use http::{EventClient, EventClientConfig};
