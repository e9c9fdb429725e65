//! Name-keyed terminal dispatch.
//!
//! A [`Dispatcher`] is a terminal processor that looks the message name up in
//! a map of registered callables. Unknown names get the same answer as the
//! default processor: 404 when authenticated, 401 otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use crate::net::connection::Connection;
use crate::routing::handler::{DefaultProcess, MessageContext, Process};
use crate::routing::message::Message;

/// Callable invoked for one registered message name.
pub type MessageFn = Arc<dyn Fn(&Arc<Connection>, &Message) + Send + Sync>;

/// Terminal processor mapping message names to callables.
#[derive(Default, Clone)]
pub struct Dispatcher {
    routes: HashMap<String, MessageFn>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` for messages named exactly `name`. Replaces an earlier
    /// registration of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Arc<Connection>, &Message) + Send + Sync + 'static,
    {
        self.routes.insert(name.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Process for Dispatcher {
    fn process(&self, ctx: &MessageContext<'_>) {
        match self.routes.get(ctx.name) {
            Some(f) => f(ctx.connection, ctx.message),
            None => {
                tracing::debug!(
                    connection_id = %ctx.connection.id(),
                    msg_name = ctx.name,
                    "No registered message callable"
                );
                DefaultProcess.process(ctx);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.routes.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher").field("routes", &names).finish()
    }
}
