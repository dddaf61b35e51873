use crate::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ModelError {
    /// A hub endpoint field is missing or unusable.
    #[error("Invalid Endpoint Error: {field}: {message} {location}")]
    InvalidEndpoint {
        field: &'static str,
        message: String,
        location: ErrorLocation,
    },
}

impl ModelError {
    #[track_caller]
    pub fn invalid_endpoint(field: &'static str, message: impl Into<String>) -> Self {
        ModelError::InvalidEndpoint {
            field,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
