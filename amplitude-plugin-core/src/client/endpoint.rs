//! Ingestion endpoint resolution

use reqwest::Url;

/// Production ingestion host used when no endpoint is configured.
pub const DEFAULT_API_ENDPOINT: &str = "api.amplitude.com";

/// Turn a configured endpoint into the base URL request paths are appended to.
///
/// An absolute URL (one with a host) is used verbatim. Anything else is a
/// bare hostname, optionally with a port, and becomes `https://{endpoint}/`.
/// `None` or an empty string resolves the default host the same way.
pub fn resolve_base_url(endpoint: Option<&str>) -> String {
    let endpoint = endpoint
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_API_ENDPOINT);

    match Url::parse(endpoint) {
        Ok(url) if url.has_host() => endpoint.to_string(),
        _ => format!("https://{}/", endpoint),
    }
}
