use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Message reported for an absent value when no override is given
pub const DEFAULT_REQUIRED_MESSAGE: &str = "is required";

/// Template used by the `only` middleware when no override is given
pub const DEFAULT_UNKNOWN_FIELD_MESSAGE: &str = "contains an unknown field: {field}";

/// Source of `VALIDATE_SCHEMA_*` overrides; swapped for a map in tests
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Failure while loading or checking an options file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read options file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in options file {}: {source}", path.display())]
    TomlParsing {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid JSON in options file {}: {source}", path.display())]
    JsonParsing {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid validation options: {0}")]
    Validation(String),

    #[error("invalid environment override: {0}")]
    Environment(String),

    #[error("unsupported options file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Decides whether a present value should be treated as absent by `optional`
pub type IgnoreValueFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Fully resolved options handed to every validator during one run.
#[derive(Clone)]
pub struct ValidationOptions {
    /// Message reported when a value is absent
    pub is_required_message: String,
    /// Keep only the first failing message per value
    pub fail_fast: bool,
    /// Present values matching this are skipped by `optional`
    pub ignore_value_if_optional: Option<IgnoreValueFn>,
    /// Template for unknown-field messages, `{field}` is replaced by the key
    pub unknown_field_message: Option<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            is_required_message: DEFAULT_REQUIRED_MESSAGE.to_string(),
            fail_fast: false,
            ignore_value_if_optional: None,
            unknown_field_message: None,
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("is_required_message", &self.is_required_message)
            .field("fail_fast", &self.fail_fast)
            .field(
                "ignore_value_if_optional",
                &self.ignore_value_if_optional.as_ref().map(|_| ".."),
            )
            .field("unknown_field_message", &self.unknown_field_message)
            .finish()
    }
}

impl ValidationOptions {
    /// Resolve a stack of layers over the library defaults, later layers win
    pub fn resolve<'a>(layers: impl IntoIterator<Item = &'a OptionsLayer>) -> Self {
        layers
            .into_iter()
            .fold(Self::default(), |options, layer| options.merged(layer))
    }

    /// Apply the values set in `layer` over these options
    pub fn merged(mut self, layer: &OptionsLayer) -> Self {
        if let Some(message) = &layer.is_required_message {
            self.is_required_message = message.clone();
        }
        if let Some(fail_fast) = layer.fail_fast {
            self.fail_fast = fail_fast;
        }
        if let Some(ignore) = &layer.ignore_value_if_optional {
            self.ignore_value_if_optional = Some(Arc::clone(ignore));
        }
        if let Some(template) = &layer.unknown_field_message {
            self.unknown_field_message = Some(template.clone());
        }
        self
    }

    /// Whether `optional` should skip this present value
    pub fn ignores(&self, value: &Value) -> bool {
        self.ignore_value_if_optional
            .as_ref()
            .is_some_and(|ignore| ignore(value))
    }
}

/// A partial set of options; unset fields fall through to the layer below.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsLayer {
    pub is_required_message: Option<String>,
    pub fail_fast: Option<bool>,
    #[serde(skip)]
    pub ignore_value_if_optional: Option<IgnoreValueFn>,
    pub unknown_field_message: Option<String>,
}

impl fmt::Debug for OptionsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsLayer")
            .field("is_required_message", &self.is_required_message)
            .field("fail_fast", &self.fail_fast)
            .field(
                "ignore_value_if_optional",
                &self.ignore_value_if_optional.as_ref().map(|_| ".."),
            )
            .field("unknown_field_message", &self.unknown_field_message)
            .finish()
    }
}

impl OptionsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.is_required_message = Some(message.into());
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    pub fn ignore_value_if_optional<F>(mut self, ignore: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.ignore_value_if_optional = Some(Arc::new(ignore));
        self
    }

    pub fn unknown_field_message(mut self, template: impl Into<String>) -> Self {
        self.unknown_field_message = Some(template.into());
        self
    }

    /// Merge two layers (second takes precedence for set values)
    pub fn merged(mut self, over: &OptionsLayer) -> Self {
        if over.is_required_message.is_some() {
            self.is_required_message = over.is_required_message.clone();
        }
        if over.fail_fast.is_some() {
            self.fail_fast = over.fail_fast;
        }
        if over.ignore_value_if_optional.is_some() {
            self.ignore_value_if_optional = over.ignore_value_if_optional.clone();
        }
        if over.unknown_field_message.is_some() {
            self.unknown_field_message = over.unknown_field_message.clone();
        }
        self
    }
}

/// Loads option defaults from files and the environment
pub struct ConfigManager;

impl ConfigManager {
    /// Load a layer from a file, then apply environment overrides on top
    pub async fn load_config(path: &Path) -> Result<OptionsLayer> {
        let layer = Self::load_from_file(path).await?;
        let layer = Self::apply_environment_overrides(layer)?;
        Self::validate_config(&layer)?;
        Ok(layer)
    }

    /// Load an options layer from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<OptionsLayer> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let from_toml = |content: &str| {
            toml::from_str::<OptionsLayer>(content).map_err(|source| ConfigError::TomlParsing {
                path: path.to_path_buf(),
                source,
            })
        };
        let from_json = |content: &str| {
            serde_json::from_str::<OptionsLayer>(content).map_err(|source| {
                ConfigError::JsonParsing {
                    path: path.to_path_buf(),
                    source,
                }
            })
        };

        let layer = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => from_toml(&content)?,
            Some("json") => from_json(&content)?,
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match from_toml(&content) {
                Ok(layer) => layer,
                Err(_) => from_json(&content)?,
            },
        };

        tracing::debug!(path = %path.display(), "loaded validation options");
        Ok(layer)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(layer: OptionsLayer) -> Result<OptionsLayer> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, layer)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut layer: OptionsLayer,
    ) -> Result<OptionsLayer> {
        if let Some(message) = env.get("VALIDATE_SCHEMA_REQUIRED_MESSAGE") {
            layer.is_required_message = Some(message);
        }

        if let Some(fail_fast) = env.get("VALIDATE_SCHEMA_FAIL_FAST") {
            layer.fail_fast = Some(fail_fast.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "VALIDATE_SCHEMA_FAIL_FAST must be true or false, got {fail_fast:?}"
                ))
            })?);
        }

        if let Some(template) = env.get("VALIDATE_SCHEMA_UNKNOWN_FIELD_MESSAGE") {
            layer.unknown_field_message = Some(template);
        }

        Ok(layer)
    }

    /// Reject layers that would produce unreadable reports
    pub fn validate_config(layer: &OptionsLayer) -> Result<()> {
        if let Some(message) = &layer.is_required_message
            && message.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "is_required_message must not be blank".to_string(),
            ));
        }

        if let Some(template) = &layer.unknown_field_message
            && template.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "unknown_field_message must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}
