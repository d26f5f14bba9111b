//! Catalog of fixed prompt fragments and user-facing fallback text.
//!
//! Prompts are stored in a nested map: `kind -> key -> value`, loaded from
//! the embedded `translations/en.json` or a custom JSON file.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::utilities::errors::ConfigError;

/// Embedded English catalog (used when no custom file is provided).
const EMBEDDED_EN_JSON: &str = include_str!("../translations/en.json");

/// Handles loading and retrieving prompt fragments.
#[derive(Debug, Clone)]
pub struct I18N {
    prompts: HashMap<String, HashMap<String, String>>,
    /// Optional path to the custom JSON file the prompts came from.
    pub prompt_file: Option<String>,
}

impl Default for I18N {
    fn default() -> Self {
        Self::embedded()
    }
}

impl I18N {
    /// Load the embedded default catalog.
    ///
    /// # Panics
    /// Panics if the embedded JSON is malformed, which the test suite rules out.
    pub fn embedded() -> Self {
        let prompts = serde_json::from_str(EMBEDDED_EN_JSON)
            .expect("Error decoding embedded en.json prompt catalog.");
        Self {
            prompts,
            prompt_file: None,
        }
    }

    /// Load a custom catalog from a JSON file.
    pub fn from_file(path: impl Into<String>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let prompts = serde_json::from_str(&content)?;
        Ok(Self {
            prompts,
            prompt_file: Some(path),
        })
    }

    /// Retrieve a prompt slice by key.
    pub fn slice(&self, slice: &str) -> &str {
        self.retrieve("slices", slice)
    }

    /// Retrieve a user-facing error message by key.
    pub fn errors(&self, error: &str) -> &str {
        self.retrieve("errors", error)
    }

    /// Retrieve a prompt by `kind` and `key`.
    ///
    /// # Panics
    /// Panics if the prompt for the given kind and key is not found.
    pub fn retrieve(&self, kind: &str, key: &str) -> &str {
        self.try_retrieve(kind, key)
            .unwrap_or_else(|| panic!("Prompt for '{}':'{}' not found.", kind, key))
    }

    /// Retrieve a prompt by `kind` and `key`, if present.
    pub fn try_retrieve(&self, kind: &str, key: &str) -> Option<&str> {
        self.prompts
            .get(kind)
            .and_then(|section| section.get(key))
            .map(String::as_str)
    }
}

static DEFAULT_I18N: OnceLock<I18N> = OnceLock::new();

/// Get the global cached catalog built from the embedded prompts.
pub fn get_i18n() -> &'static I18N {
    DEFAULT_I18N.get_or_init(I18N::embedded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED_SLICES: &[&str] = &[
        "style_header",
        "multi_message",
        "examples_header",
        "context_header",
        "behavior",
        "hinglish",
        "pet_names",
        "terse_input",
        "strategy_header",
        "recent_header",
        "repetition_header",
        "greeting_alert",
        "pet_name_alert",
        "no_constraint",
        "strategy_analysis",
        "summarize",
    ];

    #[test]
    fn test_embedded_catalog_has_every_slice() {
        let i18n = get_i18n();
        for key in REQUIRED_SLICES {
            assert!(
                i18n.try_retrieve("slices", key).is_some(),
                "missing slice '{}'",
                key
            );
        }
        assert!(i18n.errors("fallback_apology").contains("trouble"));
        assert_eq!(i18n.errors("empty_candidates"), "Hey! 🥰");
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn test_missing_slice_panics() {
        get_i18n().slice("does_not_exist");
    }

    #[test]
    fn test_custom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{"errors": {"fallback_apology": "custom"}}"#).unwrap();
        let i18n = I18N::from_file(path.to_string_lossy()).unwrap();
        assert_eq!(i18n.errors("fallback_apology"), "custom");
        assert!(i18n.try_retrieve("slices", "behavior").is_none());
    }
}
