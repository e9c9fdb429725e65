//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the message handler tree from configuration
//! - Build the connection handler tree, one sub-handler per endpoint
//! - Assemble the WebSocket server around the trees
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - All endpoints share one message root and one token authenticator
//! - The connection root has no message handler, so unmatched paths are rejected

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{HeaderAuth, MessageAuth, StaticTokenAuthenticator, TokenAuthenticator};
use crate::config::{AuthMode, EndpointConfig, RouterConfig};
use crate::http::WsServer;
use crate::middleware::{AuthCheck, MsgAuthMiddleware};
use crate::routing::templates::{DEFAULT_AUTH_REQUIRED_TEMPLATE, DEFAULT_ERROR_TEMPLATE};
use crate::routing::{
    ConnectionHandler, ConnectionStrategy, Dispatcher, Handler, Pattern, ResponseTemplates,
};

pub const PONG: &str = r#"{"type":"pong"}"#;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("endpoint '{name}' has an invalid path pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// The two routing trees built from one configuration.
#[derive(Debug, Clone)]
pub struct RoutingTrees {
    pub connection_root: Arc<ConnectionHandler>,
    pub message_root: Arc<Handler>,
}

/// Dispatcher with the built-in `ping` message.
pub fn default_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register("ping", |connection, _message| {
        connection.send_text_message(PONG);
    });
    dispatcher
}

/// Build both trees. `dispatcher` becomes the terminal processor of the
/// message root.
pub fn build_routing(
    config: &RouterConfig,
    dispatcher: Dispatcher,
) -> Result<RoutingTrees, StartupError> {
    let authenticator: Arc<dyn TokenAuthenticator> =
        Arc::new(StaticTokenAuthenticator::new(config.auth.tokens.iter().cloned()));

    let message_root = Arc::new(build_message_root(config, dispatcher, Arc::clone(&authenticator)));

    let mut connection_root = ConnectionHandler::new("RootConnectionHandler");
    for endpoint in &config.endpoints {
        let pattern = Pattern::new(&endpoint.path).map_err(|source| StartupError::InvalidPattern {
            name: endpoint.name.clone(),
            source,
        })?;
        let child = ConnectionHandler::new(endpoint.name.clone())
            .with_message_handler(Arc::clone(&message_root))
            .with_strategy(strategy_for(config, endpoint, &authenticator));
        connection_root.add_sub_handler(pattern, Arc::new(child));

        tracing::debug!(
            endpoint = %endpoint.name,
            path = %endpoint.path,
            auth = ?endpoint.auth,
            "Registered endpoint"
        );
    }

    Ok(RoutingTrees {
        connection_root: Arc::new(connection_root),
        message_root,
    })
}

/// Build the server for `config`. The returned trees must outlive the server;
/// connections only hold weak references to the message root.
pub fn build_server(
    config: &RouterConfig,
    dispatcher: Dispatcher,
) -> Result<(WsServer, RoutingTrees), StartupError> {
    let trees = build_routing(config, dispatcher)?;
    let server = WsServer::new(Some(Arc::clone(&trees.connection_root)))
        .with_max_message_size(config.listener.max_message_size);
    Ok((server, trees))
}

fn build_message_root(
    config: &RouterConfig,
    dispatcher: Dispatcher,
    authenticator: Arc<dyn TokenAuthenticator>,
) -> Handler {
    let mut root = Handler::with_processor("RootHandler", dispatcher);
    root.add_middleware(Arc::new(
        MsgAuthMiddleware::new(authenticator)
            .with_msg_name(config.auth.message_name.clone())
            .with_token_field(config.auth.token_field.clone())
            .with_closes_socket_on_failure(config.auth.in_band_closes_socket),
    ));
    if config.requires_authenticated_messages() {
        root.add_middleware(Arc::new(AuthCheck));
    }

    let templates = &config.templates;
    if templates.error.is_some() || templates.auth_required.is_some() {
        root.set_templates(ResponseTemplates::new(
            templates.error.as_deref().unwrap_or(DEFAULT_ERROR_TEMPLATE),
            templates
                .auth_required
                .as_deref()
                .unwrap_or(DEFAULT_AUTH_REQUIRED_TEMPLATE),
        ));
    }
    root
}

fn strategy_for(
    config: &RouterConfig,
    endpoint: &EndpointConfig,
    authenticator: &Arc<dyn TokenAuthenticator>,
) -> ConnectionStrategy {
    let auth = &config.auth;
    match endpoint.auth {
        AuthMode::None => ConnectionStrategy::Open,
        AuthMode::Header => ConnectionStrategy::HeaderAuth(
            HeaderAuth::new(Arc::clone(authenticator))
                .with_header_name(auth.header_name.clone())
                .with_closes_socket_on_failure(auth.header_closes_socket)
                .with_creates_connection_on_failure(auth.header_creates_connection),
        ),
        AuthMode::Message => ConnectionStrategy::MessageAuth(
            MessageAuth::new()
                .with_timeout(Duration::from_millis(auth.timeout_ms))
                .with_closes_connection_on_failure(auth.message_closes_connection),
        ),
    }
}
