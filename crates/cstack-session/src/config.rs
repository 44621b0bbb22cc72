//! Session configuration

use crate::error::ConfigError;
use cstack_codec::CommandOptions;
use cstack_model::AdvancementParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Stack session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bucket holding stack files
    pub bucket: String,
    /// Advancement for stacks that do not carry one (XML)
    pub advancement: AdvancementParams,
    /// Alias namespace preferred when adding commands
    pub preferred_namespace: Option<String>,
    /// Declared command options
    pub command_options: CommandOptions,
    /// Maximum cached command definitions
    pub definition_cache_capacity: u64,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With bucket
    #[inline]
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// With default advancement
    #[inline]
    #[must_use]
    pub fn with_advancement(mut self, advancement: AdvancementParams) -> Self {
        self.advancement = advancement;
        self
    }

    /// With preferred alias namespace
    #[inline]
    #[must_use]
    pub fn with_preferred_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.preferred_namespace = Some(namespace.into());
        self
    }

    /// With command option table
    #[inline]
    #[must_use]
    pub fn with_command_options(mut self, options: CommandOptions) -> Self {
        self.command_options = options;
        self
    }

    /// With definition cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.definition_cache_capacity = capacity;
        self
    }

    /// Parse TOML text; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] when the text is not a valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read,
    /// [`ConfigError::Parse`] when it is not a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bucket: "stacks".to_string(),
            advancement: AdvancementParams::default(),
            preferred_namespace: None,
            command_options: CommandOptions::default(),
            definition_cache_capacity: 1_000,
        }
    }
}
