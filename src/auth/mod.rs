//! Authentication subsystem.
//!
//! # Strategies
//! ```text
//! header.rs    HeaderAuth    token header checked at connect time
//! deferred.rs  MessageAuth   connect unauthenticated, auth message within timeout
//! middleware   MsgAuthMiddleware / AuthCheck (crate::middleware)
//! ```
//!
//! All strategies consult a [`TokenAuthenticator`] supplied by the embedder.

pub mod deferred;
pub mod header;

use std::collections::HashSet;

pub use deferred::{auth_timeout_expired, MessageAuth, DEFAULT_AUTH_TIMEOUT};
pub use header::{HeaderAuth, HeaderDecision, DEFAULT_TOKEN_HEADER};

/// Validates a token presented for a connection path.
pub trait TokenAuthenticator: Send + Sync {
    fn authenticate(&self, path: &str, token: &str) -> bool;
}

impl<F> TokenAuthenticator for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn authenticate(&self, path: &str, token: &str) -> bool {
        self(path, token)
    }
}

/// Accepts any token from a fixed set, regardless of path.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashSet<String>,
}

impl StaticTokenAuthenticator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenAuthenticator for StaticTokenAuthenticator {
    fn authenticate(&self, path: &str, token: &str) -> bool {
        let ok = !token.is_empty() && self.tokens.contains(token);
        if !ok {
            tracing::debug!(path, "Token rejected");
        }
        ok
    }
}
