use serde_json::Value;
use thiserror::Error;

/// Typed error shared by every quire crate.
///
/// `code` is a stable, machine-readable identifier (for example
/// `attribute-operation-wrong-old-value`). `context` carries whatever
/// structured data helps locate the failure; it is `Value::Null` when there
/// is nothing to add.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct ModelError {
    pub code: String,
    pub message: String,
    pub context: Value,
}

impl ModelError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Attach structured context to the error.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// True when the error carries the given code.
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::new("model-json-invalid", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_includes_code() {
        let err = ModelError::new("some-code", "went wrong");
        assert_eq!(err.to_string(), "some-code: went wrong");
        assert!(err.is("some-code"));
    }

    #[test]
    fn test_context_is_preserved() {
        let err = ModelError::new("x", "y").with_context(json!({ "root": "main" }));
        assert_eq!(err.context["root"], "main");
    }
}
