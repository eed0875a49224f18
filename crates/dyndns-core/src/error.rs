//! Error types for the dynamic DNS synchronizer
//!
//! This module defines all error types used throughout the workspace.

use crate::traits::IpVersion;
use thiserror::Error;

/// Result type alias for dyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dynamic DNS synchronizer
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured record could not be mapped to a provider zone
    #[error("Zone resolution failed for {record}: {message}")]
    ZoneResolution {
        /// Configured record name
        record: String,
        /// What went wrong
        message: String,
    },

    /// Address source (router polling) errors
    #[error("Address source error: {0}")]
    AddressSource(String),

    /// HTTP client errors (from provider or router APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A provider call sequence exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Reconciling one record against the provider failed
    #[error("Reconciliation of {record}/{family} failed: {source}")]
    Reconciliation {
        /// Record name of the failed action
        record: String,
        /// Address family of the failed action
        family: IpVersion,
        /// Underlying provider error
        #[source]
        source: Box<Error>,
    },

    /// The reconciliation worker is gone
    #[error("Worker stopped: {0}")]
    WorkerStopped(String),

    /// A response or document that is not the JSON we expect
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a zone resolution error
    pub fn zone_resolution(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ZoneResolution {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create an address source error
    pub fn address_source(msg: impl Into<String>) -> Self {
        Self::AddressSource(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap a provider error with the action it belongs to
    pub fn reconciliation(record: impl Into<String>, family: IpVersion, source: Error) -> Self {
        Self::Reconciliation {
            record: record.into(),
            family,
            source: Box::new(source),
        }
    }

    /// Whether a retry of the same request could succeed
    ///
    /// Rate limits, transport failures and timeouts are transient;
    /// everything else (bad credentials, missing zones, malformed
    /// responses) will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Http(_) | Self::Timeout(_))
    }
}
