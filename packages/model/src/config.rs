use quire_common::ModelResult;
use serde::{Deserialize, Serialize};

/// Model configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Name of the root created with the model
    #[serde(default = "default_root_name")]
    pub default_root_name: String,

    /// Element inserted when a limit element needs a text container
    #[serde(default = "default_paragraph_like_element")]
    pub paragraph_like_element: String,

    /// Default for `ignore_whitespaces` in content checks
    #[serde(default = "default_trim_whitespace")]
    pub trim_whitespace_in_has_content: bool,
}

fn default_root_name() -> String {
    "main".to_string()
}

fn default_paragraph_like_element() -> String {
    "paragraph".to_string()
}

fn default_trim_whitespace() -> bool {
    false
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_root_name: default_root_name(),
            paragraph_like_element: default_paragraph_like_element(),
            trim_whitespace_in_has_content: default_trim_whitespace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "defaultRootName": "body",
            "paragraphLikeElement": "p"
        }"#;

        let config = ModelConfig::from_json_str(json).unwrap();
        assert_eq!(config.default_root_name, "body");
        assert_eq!(config.paragraph_like_element, "p");
        assert!(!config.trim_whitespace_in_has_content);
    }

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.default_root_name, "main");
        assert_eq!(config.paragraph_like_element, "paragraph");
        assert!(!config.trim_whitespace_in_has_content);
    }

    #[test]
    fn test_trim_whitespace_opt_in() {
        let config = ModelConfig::from_json_str(r#"{ "trimWhitespaceInHasContent": true }"#).unwrap();
        assert!(config.trim_whitespace_in_has_content);
        assert_eq!(config.default_root_name, "main");
    }

    #[test]
    fn test_invalid_json() {
        let error = ModelConfig::from_json_str("{ nope").unwrap_err();
        assert_eq!(error.code(), "model-json-invalid");
    }
}
