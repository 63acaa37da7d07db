//! Error types for name template compilation and rendering.

use thiserror::Error;

/// Result type alias for naming operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors produced while compiling or rendering a name template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The source could not be parsed under the supported syntax and
    /// function set. `offset` is a byte offset into the template source.
    #[error("template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A value-level failure that could only be detected while rendering.
    #[error("template render error: {0}")]
    Render(String),

    /// A rendered name is not usable as a server host name.
    #[error("invalid server name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl TemplateError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Whether this error was raised at compile time.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}
