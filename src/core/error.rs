//! # Error Handling Module
//!
//! Every fallible operation in the crate returns [`BootstrapResult`]. The variants
//! follow the failure taxonomy of the two pipelines:
//!
//! - the config-server property source (`ConfigMisuse`, `Auth`, `Transport`,
//!   `Parse`, `UnsupportedOperation`, `Cancelled`)
//! - route classification and registration (`InvalidRouteType`,
//!   `MissingMeshGateway`, `Registration`)
//!
//! ## Error Propagation
//! Errors are plain data built with `thiserror`. They carry owned strings rather
//! than source errors so they stay `Clone`, which lets the registrar collect
//! per-gateway failures and still hand them back to every caller that asks.

use std::fmt;
use thiserror::Error;

/// Main result type used throughout the crate
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Failure of a single gateway partition during registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    /// Gateway whose transport failed
    pub gateway: String,
    /// Rendered error from the transport
    pub message: String,
}

impl fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.gateway, self.message)
    }
}

/// Error types for config-server loading and route registration
#[derive(Debug, Error, Clone)]
pub enum BootstrapError {
    /// Mandatory configuration is missing; startup must stop
    #[error("Configuration misuse: {message}")]
    ConfigMisuse { message: String },

    /// Invalid configuration values (unparsable env overrides, bad files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Token acquisition failed
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// Network or HTTP level failure
    #[error("Transport error: {message}")]
    Transport { message: String, status: Option<u16> },

    /// Response body could not be decoded
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Operation the source does not implement
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    /// The caller cancelled the operation
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Route type outside of public/private/internal/mesh
    #[error("Invalid route type '{value}', expected one of public, private, internal, mesh")]
    InvalidRouteType { value: String },

    /// Mesh route declared without a gateway name; `from` is empty when the
    /// route path is not known at the failure site
    #[error("{}", missing_mesh_gateway(.from))]
    MissingMeshGateway { from: String },

    /// One or more gateway partitions failed to register
    #[error("Route registration failed for {} gateway(s): {}", .failures.len(), join_failures(.failures))]
    Registration { failures: Vec<GatewayFailure> },

    /// I/O errors (reading token files, config files)
    #[error("I/O error: {message}")]
    Io { message: String },
}

fn missing_mesh_gateway(from: &str) -> String {
    if from.is_empty() {
        "Route type 'mesh' requires a gateway but no gateway was given".to_string()
    } else {
        format!("Route '{}' has route type 'mesh' but no gateway", from)
    }
}

fn join_failures(failures: &[GatewayFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl BootstrapError {
    /// Create a configuration misuse error
    pub fn misuse<S: Into<String>>(message: S) -> Self {
        Self::ConfigMisuse {
            message: message.into(),
        }
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error with a custom reason
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a transport error without an HTTP status
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create a transport error for an unexpected HTTP status
    pub fn http_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Errors that must terminate startup instead of being handled
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigMisuse { .. })
    }

    /// Check if this error is worth retrying by an outer policy
    ///
    /// Nothing in this crate retries; the classification is for callers that
    /// wrap the fetcher or the registrar in their own retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            Self::Registration { .. } => true,
            _ => false,
        }
    }

    /// Get error category for logging fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigMisuse { .. } => "config_misuse",
            Self::Configuration { .. } => "configuration",
            Self::Auth { .. } => "auth",
            Self::Transport { .. } => "transport",
            Self::Parse { .. } => "parse",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidRouteType { .. } => "invalid_route_type",
            Self::MissingMeshGateway { .. } => "missing_mesh_gateway",
            Self::Registration { .. } => "registration",
            Self::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for BootstrapError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config(format!("YAML error: {}", err))
    }
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::http_status(status.as_u16(), err.to_string()),
            None => Self::transport(err.to_string()),
        }
    }
}
