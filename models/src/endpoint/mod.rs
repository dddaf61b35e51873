pub mod builder;

/// Path of the WebSocket API on every hub.
pub const WEBSOCKET_PATH: &str = "/api/websocket";

const SCHEME_PLAIN: &str = "ws";
const SCHEME_SECURE: &str = "wss";

/// Where the hub lives. Built through [`builder::HubEndpointBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl HubEndpoint {
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            SCHEME_SECURE
        } else {
            SCHEME_PLAIN
        }
    }

    /// Compose `scheme://host:port/api/websocket`.
    pub fn websocket_url(&self) -> String {
        format!(
            "{}://{}:{}{WEBSOCKET_PATH}",
            self.scheme(),
            self.host,
            self.port
        )
    }
}
