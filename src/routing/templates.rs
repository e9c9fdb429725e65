//! Response message templates.
//!
//! The error template uses `{code}` and `{message}` placeholders. The
//! message is inserted as a JSON string literal (quotes included), so the
//! template places `{message}` where a JSON value is expected.

use std::sync::OnceLock;

pub const DEFAULT_ERROR_TEMPLATE: &str =
    r#"{"type":"result","success":false,"error":{"code":{code},"message":{message}}}"#;

pub const DEFAULT_AUTH_REQUIRED_TEMPLATE: &str = r#"{"type":"auth_required"}"#;

/// Error and auth-required response templates of a handler tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplates {
    error: String,
    auth_required: String,
}

impl ResponseTemplates {
    pub fn new(error: impl Into<String>, auth_required: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            auth_required: auth_required.into(),
        }
    }

    /// Shared instance of the built-in templates.
    pub fn defaults() -> &'static ResponseTemplates {
        static DEFAULTS: OnceLock<ResponseTemplates> = OnceLock::new();
        DEFAULTS.get_or_init(ResponseTemplates::default)
    }

    pub fn error_template(&self) -> &str {
        &self.error
    }

    pub fn auth_required(&self) -> &str {
        &self.auth_required
    }

    /// Render an error response for `code` and `message`.
    pub fn render_error(&self, code: u16, message: &str) -> String {
        let message = serde_json::Value::from(message).to_string();
        self.error
            .replace("{code}", &code.to_string())
            .replace("{message}", &message)
    }
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_TEMPLATE, DEFAULT_AUTH_REQUIRED_TEMPLATE)
    }
}
