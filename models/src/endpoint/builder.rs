use crate::HubEndpoint;
use crate::error::model_error::ModelError;

const FIELD_HOST: &str = "host";
const FIELD_PORT: &str = "port";

/// Builder for creating validated HubEndpoint instances.
///
/// Settings hand values over loosely typed (the port may arrive as a number or
/// as a numeric string), so the builder is where they are checked.
#[derive(Debug, Default)]
pub struct HubEndpointBuilder {
    host: Option<String>,
    port: Option<u16>,
    secure: Option<bool>,
}

impl HubEndpointBuilder {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Build the HubEndpoint with validation. TLS defaults to off.
    #[track_caller]
    pub fn build(self) -> Result<HubEndpoint, ModelError> {
        let host = self
            .host
            .ok_or_else(|| ModelError::invalid_endpoint(FIELD_HOST, "Host is required"))?;

        let host = host.trim().to_string();

        if host.is_empty() {
            return Err(ModelError::invalid_endpoint(FIELD_HOST, "Host cannot be empty"));
        }

        if host.contains("://") || host.contains('/') || host.contains(char::is_whitespace) {
            return Err(ModelError::invalid_endpoint(
                FIELD_HOST,
                format!("Host must be a bare hostname or address: {host}"),
            ));
        }

        let port = self
            .port
            .ok_or_else(|| ModelError::invalid_endpoint(FIELD_PORT, "Port is required"))?;

        if port == 0 {
            return Err(ModelError::invalid_endpoint(FIELD_PORT, "Port must be non-zero"));
        }

        Ok(HubEndpoint {
            host,
            port,
            secure: self.secure.unwrap_or(false),
        })
    }
}
