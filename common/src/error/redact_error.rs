use crate::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RedactError {
    /// A secret wrapper was handed to a serializer.
    #[error("Redact Error: refusing to serialize {type_name}, read it with as_str() {location}")]
    SerializationRefused {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
