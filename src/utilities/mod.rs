//! Shared utilities: configuration, errors, prompt catalog, string helpers.

pub mod config;
pub mod errors;
pub mod i18n;
pub mod string_utils;

pub use config::{LlmConfig, SynthesisConfig};
pub use errors::{ConfigError, LlmError, StoreError, SummarizeError};
pub use i18n::{get_i18n, I18N};
