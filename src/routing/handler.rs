//! Message handler tree.
//!
//! # Responsibilities
//! - Convert text/binary frames into `(name, message)` pairs
//! - Run the node's middleware chain
//! - Recurse into the first sub-handler whose pattern occurs in the name
//! - Fall back to the node's terminal processor
//!
//! # Design Decisions
//! - Trees are built once, then shared immutably behind `Arc`
//! - Message routing always stops at the first matching sub-handler, even if
//!   that child ends up doing nothing with the message
//! - Templates are inherited down the tree unless a node overrides them

use std::sync::Arc;

use crate::middleware::Middleware;
use crate::net::connection::Connection;
use crate::observability::metrics;
use crate::routing::matcher::Pattern;
use crate::routing::message::{self, Message, BINARY_MESSAGE_NAME};
use crate::routing::templates::ResponseTemplates;

/// Everything a middleware or terminal processor needs to answer a message.
pub struct MessageContext<'a> {
    pub connection: &'a Arc<Connection>,
    pub name: &'a str,
    pub message: &'a Message,
    templates: &'a ResponseTemplates,
}

impl<'a> MessageContext<'a> {
    pub fn new(
        connection: &'a Arc<Connection>,
        name: &'a str,
        message: &'a Message,
        templates: &'a ResponseTemplates,
    ) -> Self {
        Self {
            connection,
            name,
            message,
            templates,
        }
    }

    /// Templates in effect at the node that is processing the message.
    pub fn templates(&self) -> &ResponseTemplates {
        self.templates
    }

    /// Send an error rendered with the node's effective templates.
    pub fn send_error_response(&self, code: u16, message: &str) {
        self.connection.send_error_with(self.templates, code, message);
    }
}

/// Terminal hook of a handler node, invoked when no sub-handler matched.
pub trait Process: Send + Sync {
    fn process(&self, ctx: &MessageContext<'_>);
}

/// Default terminal behavior: 404 for authenticated connections, 401 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProcess;

impl Process for DefaultProcess {
    fn process(&self, ctx: &MessageContext<'_>) {
        if ctx.connection.is_authenticated() {
            ctx.send_error_response(404, "Unknown message");
        } else {
            ctx.send_error_response(401, "Authentication required");
        }
    }
}

impl<F> Process for F
where
    F: Fn(&MessageContext<'_>) + Send + Sync,
{
    fn process(&self, ctx: &MessageContext<'_>) {
        self(ctx)
    }
}

struct SubHandler {
    pattern: Pattern,
    handler: Arc<Handler>,
}

/// A node in the message-name routing tree.
pub struct Handler {
    name: String,
    middleware: Vec<Arc<dyn Middleware>>,
    sub_handlers: Vec<SubHandler>,
    processor: Box<dyn Process>,
    templates: Option<ResponseTemplates>,
}

impl Handler {
    /// Create a node with the default terminal behavior.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_processor(name, DefaultProcess)
    }

    /// Create a node with a custom terminal processor.
    pub fn with_processor(name: impl Into<String>, processor: impl Process + 'static) -> Self {
        Self {
            name: name.into(),
            middleware: Vec::new(),
            sub_handlers: Vec::new(),
            processor: Box::new(processor),
            templates: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append message middleware. Execution follows insertion order.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Append a sub-handler. Earlier patterns take priority.
    pub fn add_sub_handler(&mut self, pattern: Pattern, handler: Arc<Handler>) -> &mut Self {
        self.sub_handlers.push(SubHandler { pattern, handler });
        self
    }

    /// Override the templates for this node and its descendants. Middleware
    /// and processors at this node render errors with them.
    pub fn set_templates(&mut self, templates: ResponseTemplates) -> &mut Self {
        self.templates = Some(templates);
        self
    }

    /// Templates of this node, or the built-in defaults.
    pub fn templates(&self) -> &ResponseTemplates {
        self.templates
            .as_ref()
            .unwrap_or_else(|| ResponseTemplates::defaults())
    }

    /// Parse a text frame and route it. Malformed payloads get a 400 and are
    /// never routed.
    pub fn route_text_message(&self, connection: &Arc<Connection>, text: &str) {
        tracing::trace!(connection_id = %connection.id(), "Converting text message to JSON object");
        match message::parse_text(text) {
            Ok((name, msg)) => self.route(connection, &name, &msg),
            Err(e) => {
                metrics::record_message_rejected(e.code());
                connection.send_error_with(self.templates(), e.code(), e.message());
            }
        }
    }

    /// Route a binary frame under the `binary` message name.
    pub fn route_binary_message(&self, connection: &Arc<Connection>, data: &[u8]) {
        let msg = Message::Binary(data.to_vec());
        self.route(connection, BINARY_MESSAGE_NAME, &msg);
    }

    /// Route a parsed message through this node.
    pub fn route(&self, connection: &Arc<Connection>, msg_name: &str, message: &Message) {
        self.route_with(connection, msg_name, message, self.templates());
    }

    fn route_with(
        &self,
        connection: &Arc<Connection>,
        msg_name: &str,
        message: &Message,
        inherited: &ResponseTemplates,
    ) {
        let templates = self.templates.as_ref().unwrap_or(inherited);
        let ctx = MessageContext::new(connection, msg_name, message, templates);

        for middleware in &self.middleware {
            if !middleware.process(&ctx) {
                tracing::debug!(
                    connection_id = %connection.id(),
                    handler = %self.name,
                    middleware = middleware.name(),
                    msg_name,
                    "Middleware stopped message processing"
                );
                return;
            }
        }

        if let Some(sub) = self.sub_handlers.iter().find(|s| s.pattern.matches(msg_name)) {
            tracing::trace!(
                handler = %self.name,
                pattern = %sub.pattern,
                sub_handler = sub.handler.name(),
                msg_name,
                "Message name match"
            );
            sub.handler.route_with(connection, msg_name, message, templates);
            return;
        }

        self.processor.process(&ctx);
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new("RootHandler")
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("middleware", &self.middleware.len())
            .field(
                "sub_handlers",
                &self
                    .sub_handlers
                    .iter()
                    .map(|s| s.pattern.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::{ChannelTransport, OutboundFrame, UpgradeRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(
        handler: &Arc<Handler>,
        authenticated: bool,
    ) -> (Arc<Connection>, UnboundedReceiver<OutboundFrame>) {
        let (transport, rx) = ChannelTransport::new();
        let conn = Connection::new(
            Box::new(transport),
            UpgradeRequest::new("/ws"),
            Arc::downgrade(handler),
            authenticated,
        );
        (Arc::new(conn), rx)
    }

    fn text(rx: &mut UnboundedReceiver<OutboundFrame>) -> String {
        match rx.try_recv().expect("expected a frame") {
            OutboundFrame::Text(t) => t,
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    struct Gate {
        calls: Arc<AtomicUsize>,
        pass: bool,
    }

    impl Middleware for Gate {
        fn name(&self) -> &str {
            "Gate"
        }

        fn process(&self, _: &MessageContext<'_>) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pass
        }
    }

    fn recorder(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Handler> {
        Arc::new(Handler::with_processor(label, move |ctx: &MessageContext<'_>| {
            log.lock().unwrap().push(format!("{}:{}", label, ctx.name));
        }))
    }

    #[test]
    fn first_matching_pattern_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut root = Handler::default();
        root.add_sub_handler(Pattern::new("get").unwrap(), recorder("first", log.clone()))
            .add_sub_handler(Pattern::new("get_config").unwrap(), recorder("second", log.clone()));
        let root = Arc::new(root);
        let (conn, _rx) = connect(&root, true);

        conn.process_text_message(r#"{"type":"get_config"}"#);
        conn.process_text_message(r#"{"type":"forget"}"#);

        assert_eq!(*log.lock().unwrap(), vec!["first:get_config", "first:forget"]);
    }

    #[test]
    fn failing_middleware_stops_chain_and_matching() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let mut root = Handler::default();
        root.add_middleware(Arc::new(Gate { calls: first.clone(), pass: true }))
            .add_middleware(Arc::new(Gate { calls: second.clone(), pass: false }))
            .add_middleware(Arc::new(Gate { calls: third.clone(), pass: true }))
            .add_sub_handler(Pattern::new("").unwrap(), recorder("any", log.clone()));
        let root = Arc::new(root);
        let (conn, mut rx) = connect(&root, true);

        conn.process_text_message(r#"{"type":"ping"}"#);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn matched_child_does_not_fall_back_to_siblings() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut blocked = Handler::new("blocked");
        blocked.add_middleware(Arc::new(Gate { calls: calls.clone(), pass: false }));

        let mut root = Handler::default();
        root.add_sub_handler(Pattern::new("ping").unwrap(), Arc::new(blocked))
            .add_sub_handler(Pattern::new("ping").unwrap(), recorder("sibling", log.clone()));
        let root = Arc::new(root);
        let (conn, _rx) = connect(&root, true);

        conn.process_text_message(r#"{"type":"ping"}"#);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn default_process_answers_by_auth_state() {
        let root = Arc::new(Handler::default());

        let (conn, mut rx) = connect(&root, true);
        conn.process_text_message(r#"{"type":"ping"}"#);
        assert_eq!(
            text(&mut rx),
            r#"{"type":"result","success":false,"error":{"code":404,"message":"Unknown message"}}"#
        );

        let (conn, mut rx) = connect(&root, false);
        conn.process_text_message(r#"{"type":"ping"}"#);
        assert_eq!(
            text(&mut rx),
            r#"{"type":"result","success":false,"error":{"code":401,"message":"Authentication required"}}"#
        );
    }

    #[test]
    fn malformed_payloads_are_not_routed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut root = Handler::default();
        root.add_middleware(Arc::new(Gate { calls: calls.clone(), pass: true }));
        let root = Arc::new(root);
        let (conn, mut rx) = connect(&root, true);

        conn.process_text_message("{not json");
        conn.process_text_message("42");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(text(&mut rx).contains(r#""code":400,"message":"Invalid json""#));
        assert!(text(&mut rx).contains(r#""message":"Expected json object payload""#));
    }

    #[test]
    fn binary_frames_route_under_binary_name() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut root = Handler::default();
        root.add_sub_handler(
            Pattern::exact("binary").unwrap(),
            Arc::new(Handler::with_processor("bin", move |ctx: &MessageContext<'_>| {
                *sink.lock().unwrap() = ctx.message.as_bytes().map(|b| b.to_vec());
            })),
        );
        let root = Arc::new(root);
        let (conn, _rx) = connect(&root, true);

        conn.process_binary_message(&[0xde, 0xad]);

        assert_eq!(*seen.lock().unwrap(), Some(vec![0xde, 0xad]));
    }

    #[test]
    fn children_inherit_templates_unless_overridden() {
        let mut custom = Handler::new("custom");
        custom.set_templates(ResponseTemplates::new(r#"{"err":{code}}"#, "{}"));

        let mut root = Handler::default();
        root.set_templates(ResponseTemplates::new(r#"{"root":{code},"msg":{message}}"#, "{}"))
            .add_sub_handler(Pattern::new("^plain").unwrap(), Arc::new(Handler::new("plain")))
            .add_sub_handler(Pattern::new("^custom").unwrap(), Arc::new(custom));
        let root = Arc::new(root);
        let (conn, mut rx) = connect(&root, true);

        conn.process_text_message(r#"{"type":"plain"}"#);
        conn.process_text_message(r#"{"type":"custom"}"#);

        assert_eq!(text(&mut rx), r#"{"root":404,"msg":"Unknown message"}"#);
        assert_eq!(text(&mut rx), r#"{"err":404}"#);
    }

    #[test]
    fn middleware_errors_use_node_templates() {
        let mut guarded = Handler::new("guarded");
        guarded
            .set_templates(ResponseTemplates::new(r#"{"denied":{code}}"#, "{}"))
            .add_middleware(Arc::new(crate::middleware::AuthCheck));

        let mut root = Handler::default();
        root.add_sub_handler(Pattern::new("^secure").unwrap(), Arc::new(guarded));
        let root = Arc::new(root);
        let (conn, mut rx) = connect(&root, false);

        conn.process_text_message(r#"{"type":"secure_ping"}"#);

        assert_eq!(text(&mut rx), r#"{"denied":401}"#);
        assert!(rx.try_recv().is_err());
    }
}
