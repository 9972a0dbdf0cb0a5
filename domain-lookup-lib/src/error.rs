//! Error handling for domain lookup operations.
//!
//! Errors fall into three broad classes:
//! - input errors (malformed domains, empty or oversized bulk batches), rejected before any I/O
//! - transport errors (DNS failure, refused connection, timeout)
//! - protocol errors (unexpected HTTP status, unusable responses)
//!
//! An RDAP "not found" is not an error at all; it is reported through
//! [`QueryOutcome::NotFound`](crate::types::QueryOutcome).

use std::fmt;
use std::time::Duration;

/// Main error type for domain lookup operations.
#[derive(Debug, Clone)]
pub enum LookupError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Malformed top-level input (e.g. empty or oversized bulk request)
    InvalidInput { message: String },

    /// Network-related errors (connection refused, reset, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// The WHOIS server host could not be resolved
    WhoisServerNotFound { server: String },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// RDAP protocol specific errors
    RdapError {
        domain: String,
        message: String,
        status_code: Option<u16>,
    },

    /// JSON parsing errors for RDAP responses and cached values
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// The cache backend failed
    CacheError { key: String, message: String },

    /// The TLD mapping store failed
    MappingStoreError { tld: String, message: String },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading configuration or domain lists
    FileError { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl LookupError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid input error.
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn whois_server_not_found<S: Into<String>>(server: S) -> Self {
        Self::WhoisServerNotFound {
            server: server.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new RDAP error.
    pub fn rdap<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new RDAP error with HTTP status code.
    pub fn rdap_with_status<D: Into<String>, M: Into<String>>(
        domain: D,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn cache<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::CacheError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn mapping_store<T: Into<String>, M: Into<String>>(tld: T, message: M) -> Self {
        Self::MappingStoreError {
            tld: tld.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error was caused by malformed caller input.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidDomain { .. } | Self::InvalidInput { .. })
    }

    /// Whether this error came from the network rather than the remote protocol.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::WhoisServerNotFound { .. }
        )
    }

    /// Whether this error came from an unexpected remote response.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::RdapError { .. } | Self::ParseError { .. }
        )
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::InvalidInput { message } => write!(f, "{}", message),
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::WhoisServerNotFound { server } => {
                write!(f, "DNS resolution failed for WHOIS server: {}", server)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::RdapError {
                domain,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "RDAP error for '{}' (HTTP {}): {}", domain, code, message)
                } else {
                    write!(f, "RDAP error for '{}': {}", domain, message)
                }
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::CacheError { key, message } => {
                write!(f, "Cache error for '{}': {}", key, message)
            }
            Self::MappingStoreError { tld, message } => {
                write!(f, "TLD mapping store error for '{}': {}", tld, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for LookupError {}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("HTTP request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<std::io::Error> for LookupError {
    fn from(err: std::io::Error) -> Self {
        Self::network_with_source(format!("I/O error ({:?})", err.kind()), err.to_string())
    }
}
