//! Error types for amplitude-plugin-core

use thiserror::Error;

/// Main error type for the amplitude-plugin-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing plugin configuration.
    ///
    /// Raised synchronously at construction or `initialize` time, before any
    /// network or SDK call is made.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure reported by the HTTP transport
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Amplitude answered with a status other than 200
    #[error("unexpected response from Amplitude {status}: {details}")]
    Protocol { status: u16, details: String },

    /// A lifecycle hook was called before `initialize`
    #[error("plugin is not initialized")]
    NotReady,

    /// `initialize` was called on an adapter that already owns a client
    #[error("plugin is already initialized")]
    AlreadyInitialized,

    /// No async runtime available for a detached call
    #[error("runtime error: {0}")]
    Runtime(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status carried by a protocol error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for amplitude-plugin-core
pub type Result<T> = std::result::Result<T, Error>;
