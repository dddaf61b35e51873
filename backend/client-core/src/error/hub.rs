//! Error types for the hub session.
//!
//! Retry decisions are made by variant (`is_retryable()`), never by message text.

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum HubError {
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Socket Error: {message} {location}")]
    Socket {
        message: String,
        location: ErrorLocation,
    },

    #[error("Authentication Error: {message} {location}")]
    Authentication {
        message: String,
        location: ErrorLocation,
    },

    #[error("Missing Credentials Error: {message} {location}")]
    MissingCredentials {
        message: String,
        location: ErrorLocation,
    },

    #[error("Malformed Message Error: {message} {location}")]
    MalformedMessage {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Key Error: {key} is already pending {location}")]
    DuplicateKey {
        key: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: no response within {timeout_secs}s {location}")]
    Timeout {
        timeout_secs: u64,
        location: ErrorLocation,
    },

    #[error("Configuration Error: {message} {location}")]
    Configuration {
        message: String,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Attempts Exhausted Error: gave up after {attempts} attempts {location}")]
    AttemptsExhausted {
        attempts: u32,
        location: ErrorLocation,
    },
}

impl HubError {
    #[track_caller]
    pub fn connect(message: impl Into<String>) -> Self {
        HubError::Connect {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        HubError::Closed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn socket(message: impl Into<String>) -> Self {
        HubError::Socket {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn authentication(message: impl Into<String>) -> Self {
        HubError::Authentication {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn missing_credentials(message: impl Into<String>) -> Self {
        HubError::MissingCredentials {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn malformed(message: impl Into<String>) -> Self {
        HubError::MalformedMessage {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        HubError::DuplicateKey {
            key: key.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(timeout_secs: u64) -> Self {
        HubError::Timeout {
            timeout_secs,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn configuration(message: impl Into<String>) -> Self {
        HubError::Configuration {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        HubError::Validation {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn attempts_exhausted(attempts: u32) -> Self {
        HubError::AttemptsExhausted {
            attempts,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Transport-level failures are retried by the supervisor; everything else is
    /// a configuration or programming problem that another attempt will not fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            HubError::Connect { .. } => true,
            HubError::Closed { .. } => true,
            HubError::Socket { .. } => true,

            HubError::Authentication { .. } => false,
            HubError::MissingCredentials { .. } => false,
            HubError::MalformedMessage { .. } => false,
            HubError::DuplicateKey { .. } => false,
            HubError::Timeout { .. } => false,
            HubError::Configuration { .. } => false,
            HubError::Validation { .. } => false,
            HubError::AttemptsExhausted { .. } => false,
        }
    }

    /// Get error category for logs.
    pub fn error_category(&self) -> &'static str {
        match self {
            HubError::Connect { .. } => "connect",
            HubError::Closed { .. } => "closed",
            HubError::Socket { .. } => "socket",
            HubError::Authentication { .. } => "authentication",
            HubError::MissingCredentials { .. } => "missing_credentials",
            HubError::MalformedMessage { .. } => "malformed_message",
            HubError::DuplicateKey { .. } => "duplicate_key",
            HubError::Timeout { .. } => "timeout",
            HubError::Configuration { .. } => "configuration",
            HubError::Validation { .. } => "validation",
            HubError::AttemptsExhausted { .. } => "attempts_exhausted",
        }
    }
}
