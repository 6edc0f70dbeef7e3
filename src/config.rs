//! Runtime configuration.
//!
//! Configuration comes from a TOML document or from `NODE_INVENTORY_*`
//! environment variables. Every field except the database URL has a default.

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "NODE_INVENTORY_";

const DEFAULT_POOL_MAX_SIZE: u32 = 8;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid("log_format", value)),
        }
    }
}

/// Whether attribute-only node edits bump the versions of the groups that
/// reference the edited nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeUpdatePolicy {
    /// Only membership changes (import of new nodes, removal) propagate.
    #[default]
    Ignore,
    /// In-place link changes also propagate.
    Propagate,
}

impl FromStr for AttributeUpdatePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "propagate" => Ok(Self::Propagate),
            _ => Err(ConfigError::invalid("attribute_update_policy", value)),
        }
    }
}

/// Inventory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    /// Page size used when a listing omits `first`.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// Largest accepted `first`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Propagation policy for attribute-only edits.
    #[serde(default)]
    pub attribute_update_policy: AttributeUpdatePolicy,
}

const fn default_pool_max_size() -> u32 {
    DEFAULT_POOL_MAX_SIZE
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

impl InventoryConfig {
    /// Creates a configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            log_format: LogFormat::default(),
            attribute_update_policy: AttributeUpdatePolicy::default(),
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed documents and
    /// [`ConfigError::Invalid`] when values are inconsistent.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `NODE_INVENTORY_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `NODE_INVENTORY_DATABASE_URL`
    /// is unset and [`ConfigError::Invalid`] for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a variable lookup function.
    ///
    /// `lookup` receives full variable names such as
    /// `NODE_INVENTORY_MAX_PAGE_SIZE`.
    ///
    /// # Errors
    ///
    /// See [`InventoryConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("database_url"))?;
        let mut config = Self::new(database_url);
        if let Some(raw) = var("POOL_MAX_SIZE") {
            config.pool_max_size = parse_number("pool_max_size", &raw)?;
        }
        if let Some(raw) = var("DEFAULT_PAGE_SIZE") {
            config.default_page_size = parse_number("default_page_size", &raw)?;
        }
        if let Some(raw) = var("MAX_PAGE_SIZE") {
            config.max_page_size = parse_number("max_page_size", &raw)?;
        }
        if let Some(raw) = var("LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }
        if let Some(raw) = var("ATTRIBUTE_UPDATE_POLICY") {
            config.attribute_update_policy = raw.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Missing("database_url"));
        }
        if self.pool_max_size == 0 {
            return Err(ConfigError::invalid("pool_max_size", "0"));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::invalid("max_page_size", "0"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::invalid(
                "default_page_size",
                self.default_page_size.to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, raw))
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an unusable value.
    #[error("invalid value '{value}' for {field}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The TOML document could not be parsed.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            value: value.into(),
        }
    }
}
