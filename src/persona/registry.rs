//! Persona registry loaded once from YAML.

use std::path::Path;

use serde::Deserialize;

use super::config::PersonaConfig;
use crate::chat::features::Vocabulary;
use crate::utilities::errors::ConfigError;

/// Persona definitions shipped with the crate.
const EMBEDDED_PERSONAS_YAML: &str = include_str!("personas.yaml");

/// Separator between system prompts in [`PersonaRegistry::all_system_prompts`].
pub const SYSTEM_PROMPT_SEPARATOR: &str = "\n---\n\n";

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    vocabulary: Option<Vocabulary>,
    personas: Vec<PersonaConfig>,
}

/// Immutable collection of personas plus the shared detection vocabulary.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<PersonaConfig>,
    vocabulary: Vocabulary,
}

impl PersonaRegistry {
    /// Parse a registry from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile = serde_yaml::from_str(yaml)?;
        Self::new(file.personas, file.vocabulary.unwrap_or_default())
    }

    /// Read and parse a registry file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_yaml_str(&content)?;
        log::info!(
            "Loaded {} personas from {}",
            registry.personas.len(),
            path.display()
        );
        Ok(registry)
    }

    /// The personas compiled into the binary.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml_str(EMBEDDED_PERSONAS_YAML)
    }

    /// Load from `path` if given, else from `PERSONAS_CONFIG`, else the embedded set.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let from_env = std::env::var("PERSONAS_CONFIG").ok();
        match path.map(str::to_string).or(from_env) {
            Some(p) => Self::from_file(p),
            None => Self::embedded(),
        }
    }

    /// Build a registry, validating every persona and id uniqueness.
    pub fn new(personas: Vec<PersonaConfig>, vocabulary: Vocabulary) -> Result<Self, ConfigError> {
        if personas.is_empty() {
            return Err(ConfigError::Validation("no personas defined".into()));
        }
        for (i, persona) in personas.iter().enumerate() {
            persona.validate().map_err(ConfigError::Validation)?;
            if personas[..i].iter().any(|p| p.id == persona.id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate persona id '{}'",
                    persona.id
                )));
            }
        }
        Ok(Self {
            personas,
            vocabulary,
        })
    }

    /// Look up a persona by id.
    pub fn get(&self, id: &str) -> Result<&PersonaConfig, ConfigError> {
        self.personas
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ConfigError::UnknownPersona(id.to_string()))
    }

    /// Static system prompt of one persona.
    pub fn system_prompt(&self, id: &str) -> Result<&str, ConfigError> {
        self.get(id).map(|p| p.system_prompt.as_str())
    }

    /// Opening message of one persona, if it defines one.
    pub fn greeting(&self, id: &str) -> Result<Option<&str>, ConfigError> {
        self.get(id).map(|p| p.greeting.as_deref())
    }

    /// Every system prompt in registry order, each headed by its persona id.
    pub fn all_system_prompts(&self) -> String {
        self.personas
            .iter()
            .map(|p| format!("{}:\n{}\n", p.id, p.system_prompt.trim_end()))
            .collect::<Vec<_>>()
            .join(SYSTEM_PROMPT_SEPARATOR)
    }

    /// All personas in registry order.
    pub fn available(&self) -> &[PersonaConfig] {
        &self.personas
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}
