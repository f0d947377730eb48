//! Typed errors for the client.
//!
//! - `ApiError`: URL building, transport, status and record validation failures from the REST API
//! - `ConfigError`: configuration file and environment resolution
//! - `LayoutError`: the locally persisted board layout

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the remote task API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid {kind} record: {reason}")]
    InvalidRecord { kind: &'static str, reason: String },

    #[error("Cannot build a request URL from {base}: {reason}")]
    BadUrl { base: String, reason: String },
}

impl ApiError {
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        ApiError::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required setting '{key}' (set it in the config file or via {env})")]
    Missing { key: &'static str, env: &'static str },
}

/// Errors while persisting the local board layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to write layout file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode layout: {0}")]
    Encode(#[from] serde_json::Error),
}
