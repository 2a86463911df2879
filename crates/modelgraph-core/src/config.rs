//! Runtime configuration, loadable from TOML.
//!
//! ```toml
//! [context]
//! source = "server"
//!
//! [serialize]
//! validate = true
//! ```

use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config source identity must not be empty")]
    EmptySource,
}

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub context: ContextConfig,
    pub serialize: SerializeConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;

        if config
            .context
            .source
            .as_deref()
            .is_some_and(|source| source.trim().is_empty())
        {
            return Err(ConfigError::EmptySource);
        }

        Ok(config)
    }
}

///
/// ContextConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Source identity recorded on locally assigned fields.
    pub source: Option<String>,
}

///
/// SerializeConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerializeConfig {
    /// Validate the root instance before serializing it.
    pub validate: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self { validate: true }
    }
}

///
/// TESTS
///
