//! Static pattern library: example (input, candidate outputs) pairs per
//! persona, grouped by conversation category.
//!
//! The library feeds both the few-shot examples in the prompt and the
//! deterministic fallback when the LLM is unavailable. Enumeration order is
//! file order; scoring tie-breaks and fallback "first match" depend on it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persona::PersonaConfig;
use crate::utilities::errors::ConfigError;

/// Pattern library shipped with the crate.
const EMBEDDED_PATTERNS_JSON: &str = include_str!("patterns.json");

/// One or many candidate replies for a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternOutput {
    Single(String),
    Many(Vec<String>),
}

impl PatternOutput {
    /// Candidates as a slice; a single output is a one-element slice.
    pub fn candidates(&self) -> &[String] {
        match self {
            PatternOutput::Single(s) => std::slice::from_ref(s),
            PatternOutput::Many(v) => v,
        }
    }
}

/// An example input with its candidate replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub input: String,
    pub output: PatternOutput,
    /// Emotion tags returned with a fallback reply.
    #[serde(default)]
    pub emotions: Vec<String>,
    /// Follow-up suggestions returned with a fallback reply.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// A named group of patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCategory {
    pub name: String,
    pub patterns: Vec<PatternEntry>,
}

/// All categories backing one or more personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSet {
    pub id: String,
    pub categories: Vec<PatternCategory>,
}

impl PatternSet {
    pub fn category(&self, name: &str) -> Option<&PatternCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Total number of entries across categories.
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.patterns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable pattern library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternLibrary {
    sets: Vec<PatternSet>,
}

impl PatternLibrary {
    /// Parse a library from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let library: PatternLibrary = serde_json::from_str(json)?;
        library.validate()?;
        Ok(library)
    }

    /// Read and parse a library file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let library = Self::from_json_str(&content)?;
        library.log_loaded(&path.display().to_string());
        Ok(library)
    }

    /// The library compiled into the binary.
    pub fn embedded() -> Result<Self, ConfigError> {
        let library = Self::from_json_str(EMBEDDED_PATTERNS_JSON)?;
        library.log_loaded("embedded patterns.json");
        Ok(library)
    }

    /// Load from `path` if given, else from `PERSONAS_PATTERNS`, else the embedded library.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let from_env = std::env::var("PERSONAS_PATTERNS").ok();
        match path.map(str::to_string).or(from_env) {
            Some(p) => Self::from_file(p),
            None => Self::embedded(),
        }
    }

    fn log_loaded(&self, source: &str) {
        for set in &self.sets {
            log::info!(
                "Loaded pattern set '{}' from {}: {} categories, {} patterns",
                set.id,
                source,
                set.categories.len(),
                set.len()
            );
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, set) in self.sets.iter().enumerate() {
            if self.sets[..i].iter().any(|s| s.id == set.id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate pattern set '{}'",
                    set.id
                )));
            }
            for category in &set.categories {
                if let Some(entry) = category.patterns.iter().find(|p| p.input.trim().is_empty()) {
                    return Err(ConfigError::Validation(format!(
                        "pattern set '{}' category '{}' has an entry with empty input ({:?})",
                        set.id, category.name, entry.output
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn set(&self, id: &str) -> Option<&PatternSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    /// Patterns of one category for a persona; empty when the category is unknown.
    pub fn patterns_for(&self, persona: &PersonaConfig, category: &str) -> &[PatternEntry] {
        match self.set(persona.pattern_set()).and_then(|s| s.category(category)) {
            Some(c) => &c.patterns,
            None => {
                log::warn!(
                    "No training patterns found for category: {} (persona {})",
                    category,
                    persona.id
                );
                &[]
            }
        }
    }

    /// Every category the persona draws from, in enumeration order.
    ///
    /// If the persona lists `pattern_categories`, that list fixes the order
    /// and the selection; otherwise the whole set is used in file order.
    pub fn all_patterns(&self, persona: &PersonaConfig) -> Vec<&PatternCategory> {
        let Some(set) = self.set(persona.pattern_set()) else {
            log::warn!(
                "Pattern set '{}' for persona '{}' not found",
                persona.pattern_set(),
                persona.id
            );
            return Vec::new();
        };

        if persona.pattern_categories.is_empty() {
            set.categories.iter().collect()
        } else {
            persona
                .pattern_categories
                .iter()
                .filter_map(|name| set.category(name))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRegistry;

    #[test]
    fn test_embedded_library_loads() {
        let library = PatternLibrary::embedded().unwrap();
        let priya = library.set("priya").unwrap();
        let names: Vec<_> = priya.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["greetings", "flirting", "emotional_support", "hinglish_heavy"]);
        assert!(library.set("general").is_some());
    }

    #[test]
    fn test_output_single_or_many() {
        let library = PatternLibrary::embedded().unwrap();
        let greetings = &library.set("priya").unwrap().category("greetings").unwrap().patterns;
        let morning = greetings.iter().find(|p| p.input == "Good morning").unwrap();
        assert_eq!(morning.output.candidates().len(), 3);
        assert!(!morning.follow_up_questions.is_empty());

        let single = PatternOutput::Single("only".into());
        assert_eq!(single.candidates(), &["only".to_string()]);
    }

    #[test]
    fn test_persona_category_selection() {
        let registry = PersonaRegistry::embedded().unwrap();
        let library = PatternLibrary::embedded().unwrap();

        let therapist = registry.get("therapist").unwrap();
        let names: Vec<_> = library
            .all_patterns(therapist)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["emotional_support", "greetings"]);

        let career = registry.get("career").unwrap();
        assert_eq!(library.all_patterns(career).len(), 1);

        let priya = registry.get("priya").unwrap();
        assert_eq!(library.all_patterns(priya).len(), 4);
        assert!(!library.patterns_for(priya, "flirting").is_empty());
        assert!(library.patterns_for(priya, "no_such_category").is_empty());
    }

    #[test]
    fn test_duplicate_set_rejected() {
        let json = r#"{"sets": [
            {"id": "a", "categories": []},
            {"id": "a", "categories": []}
        ]}"#;
        assert!(PatternLibrary::from_json_str(json).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(
            &path,
            r#"{"sets": [{"id": "x", "categories": [
                {"name": "c", "patterns": [{"input": "hi", "output": ["a", "b"]}]}
            ]}]}"#,
        )
        .unwrap();
        let library = PatternLibrary::from_file(&path).unwrap();
        assert_eq!(library.set("x").unwrap().len(), 1);
    }
}
