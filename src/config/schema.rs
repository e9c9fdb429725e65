//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::auth::{DEFAULT_AUTH_TIMEOUT, DEFAULT_TOKEN_HEADER};
use crate::middleware::msg_auth::{DEFAULT_AUTH_MESSAGE, DEFAULT_TOKEN_FIELD};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, frame limits).
    pub listener: ListenerConfig,

    /// Authentication strategy settings shared by all endpoints.
    pub auth: AuthConfig,

    /// Response template overrides.
    pub templates: TemplateConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Endpoint definitions, matched in order.
    pub endpoints: Vec<EndpointConfig>,
}

impl RouterConfig {
    /// Whether the message root gates messages on the authenticated flag.
    pub fn requires_authenticated_messages(&self) -> bool {
        self.auth.require_authenticated_messages.unwrap_or_else(|| {
            self.endpoints
                .iter()
                .any(|endpoint| endpoint.auth == AuthMode::Message)
        })
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound message size in bytes. 0 keeps the transport default.
    pub max_message_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_message_size: 0,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the token for header-authenticated endpoints.
    pub header_name: String,

    /// Message name carrying an in-band token. Empty matches every message.
    pub message_name: String,

    /// JSON field holding the in-band token.
    pub token_field: String,

    /// Close the socket when header authentication fails.
    pub header_closes_socket: bool,

    /// Create an unauthenticated connection when header authentication fails.
    pub header_creates_connection: bool,

    /// Close the connection when the deferred auth timer fires.
    pub message_closes_connection: bool,

    /// Close the socket after a failed in-band authentication.
    pub in_band_closes_socket: bool,

    /// Deferred authentication timeout in milliseconds.
    pub timeout_ms: u64,

    /// Reject messages on unauthenticated connections with 401. Unset means
    /// enabled whenever an endpoint uses message authentication.
    pub require_authenticated_messages: Option<bool>,

    /// Accepted tokens.
    pub tokens: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_TOKEN_HEADER.to_string(),
            message_name: DEFAULT_AUTH_MESSAGE.to_string(),
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
            header_closes_socket: true,
            header_creates_connection: false,
            message_closes_connection: true,
            in_band_closes_socket: true,
            timeout_ms: DEFAULT_AUTH_TIMEOUT.as_millis() as u64,
            require_authenticated_messages: None,
            tokens: Vec::new(),
        }
    }
}

/// Response template overrides. Unset fields keep the built-in templates.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TemplateConfig {
    /// Error template with `{code}` and `{message}` placeholders.
    pub error: Option<String>,

    /// Payload sent when a connection must authenticate.
    pub auth_required: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// How connections reaching an endpoint authenticate.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Connections are authenticated on creation.
    #[default]
    None,
    /// Token read from the upgrade request header.
    Header,
    /// Token expected in a message before the timeout.
    Message,
}

/// Endpoint mapping a path pattern to an authentication mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint identifier for logging.
    pub name: String,

    /// Path pattern (regex, unanchored).
    pub path: String,

    #[serde(default)]
    pub auth: AuthMode,
}
