//! Configuration management for quill pipelines.
//!
//! Parses `quill.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `pipeline.base_url`
//! - `pipeline.info_url`

mod expand;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quill.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline defaults.
    pub pipeline: PipelineConfig,
    /// Identifier pattern overrides.
    pub patterns: PatternsConfig,
    /// Sanitizer policy selection.
    pub sanitize: SanitizeConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Default context values applied to every pipeline run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL for reference links.
    pub base_url: String,
    /// Link target for the `@mention` keyword.
    pub info_url: Option<String>,
    /// Whether bare URLs are turned into links.
    pub autolink: bool,
    /// Whether per-call context may override these defaults.
    pub allow_context_override: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "/".to_owned(),
            info_url: None,
            autolink: true,
            allow_context_override: false,
        }
    }
}

/// Identifier pattern overrides (regex source, without sigil).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Pattern for user logins in `@login` mentions.
    pub username: Option<String>,
    /// Pattern for issue numbers in `#123` references.
    pub issue_id: Option<String>,
}

/// Named sanitizer profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Default profile for comments and issue bodies.
    #[default]
    Main,
    /// Inline formatting, links, images and lists only.
    Limited,
    /// Text only.
    StripAll,
    /// Policy described by `[sanitize.custom]`.
    Custom,
}

/// Sanitizer configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Selected profile.
    pub profile: Profile,
    /// Custom policy (required when `profile = "custom"`).
    pub custom: Option<WhitelistConfig>,
}

/// Custom whitelist policy as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Allowed element names.
    pub elements: Vec<String>,
    /// Elements removed together with their contents.
    pub remove_contents: Vec<String>,
    /// Attributes allowed on every element.
    pub global_attributes: Vec<String>,
    /// Attributes allowed per element.
    pub attributes: HashMap<String, Vec<String>>,
    /// Allowed URI protocols per element and attribute (`relative` for
    /// schemeless references).
    pub protocols: HashMap<String, HashMap<String, Vec<String>>>,
    /// Structural rules; `None` selects the standard list and table rules.
    pub rules: Option<Vec<RuleConfig>>,
}

/// Structural rule: unwrap `elements` unless inside one of `ancestors`.
#[derive(Debug, Default, Deserialize)]
pub struct RuleConfig {
    /// Elements the rule applies to.
    pub elements: Vec<String>,
    /// Required ancestor names.
    pub ancestors: Vec<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`pipeline.base_url`").
        field: String,
        /// Error message (e.g., "${`QUILL_BASE_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quill.toml` in current directory and parents
    /// and falls back to defaults when none is found.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::discover_config() {
            Some(discovered) => Self::load_from_file(&discovered),
            None => {
                tracing::debug!("No {CONFIG_FILENAME} found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from TOML text.
    ///
    /// Applies environment expansion and validation like [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.to_path_buf());

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pipeline()?;
        self.validate_patterns()?;
        self.validate_sanitize()?;
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.pipeline.base_url, "pipeline.base_url")?;
        if let Some(ref info_url) = self.pipeline.info_url {
            require_http_url(info_url, "pipeline.info_url")?;
        }
        Ok(())
    }

    fn validate_patterns(&self) -> Result<(), ConfigError> {
        if let Some(ref username) = self.patterns.username {
            require_non_empty(username, "patterns.username")?;
        }
        if let Some(ref issue_id) = self.patterns.issue_id {
            require_non_empty(issue_id, "patterns.issue_id")?;
        }
        Ok(())
    }

    fn validate_sanitize(&self) -> Result<(), ConfigError> {
        match (self.sanitize.profile, &self.sanitize.custom) {
            (Profile::Custom, None) => Err(ConfigError::Validation(
                "sanitize.profile = \"custom\" requires a [sanitize.custom] section".to_owned(),
            )),
            (Profile::Custom, Some(custom)) => {
                for element in custom.protocols.keys() {
                    if !custom.elements.contains(element) {
                        tracing::warn!(
                            element = %element,
                            "Protocol rule for an element that is not allowed"
                        );
                    }
                }
                Ok(())
            }
            (_, Some(_)) => {
                tracing::warn!("[sanitize.custom] is ignored unless profile = \"custom\"");
                Ok(())
            }
            (_, None) => Ok(()),
        }
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.pipeline.base_url = expand::expand_env(&self.pipeline.base_url, "pipeline.base_url")?;
        if let Some(ref url) = self.pipeline.info_url {
            self.pipeline.info_url = Some(expand::expand_env(url, "pipeline.info_url")?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.pipeline.base_url, "/");
        assert!(config.pipeline.autolink);
        assert!(!config.pipeline.allow_context_override);
        assert_eq!(config.sanitize.profile, Profile::Main);
        assert!(config.patterns.username.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(
            r#"
[pipeline]
base_url = "https://example.com/"
info_url = "https://example.com/help/mentions"
autolink = false
allow_context_override = true

[patterns]
username = "[a-z]+"
issue_id = "[0-9]{1,6}"

[sanitize]
profile = "strip-all"
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.base_url, "https://example.com/");
        assert_eq!(
            config.pipeline.info_url.as_deref(),
            Some("https://example.com/help/mentions")
        );
        assert!(!config.pipeline.autolink);
        assert!(config.pipeline.allow_context_override);
        assert_eq!(config.patterns.username.as_deref(), Some("[a-z]+"));
        assert_eq!(config.sanitize.profile, Profile::StripAll);
    }

    #[test]
    fn test_parse_custom_profile() {
        let config = Config::from_toml_str(
            r#"
[sanitize]
profile = "custom"

[sanitize.custom]
elements = ["p", "a"]
remove_contents = ["script"]
global_attributes = ["title"]
attributes = { a = ["href"] }
protocols = { a = { href = ["https", "relative"] } }
"#,
        )
        .unwrap();

        let custom = config.sanitize.custom.unwrap();
        assert_eq!(custom.elements, ["p", "a"]);
        assert_eq!(custom.attributes["a"], ["href"]);
        assert_eq!(custom.protocols["a"]["href"], ["https", "relative"]);
        assert!(custom.rules.is_none());
    }

    #[test]
    fn test_custom_profile_requires_section() {
        let err = Config::from_toml_str("[sanitize]\nprofile = \"custom\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let err = Config::from_toml_str("[sanitize]\nprofile = \"relaxed\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = Config::from_toml_str("[pipeline]\nbase_url = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("pipeline.base_url"));
    }

    #[test]
    fn test_info_url_requires_http() {
        let err =
            Config::from_toml_str("[pipeline]\ninfo_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(err.to_string().contains("pipeline.info_url"));
    }

    #[test]
    fn test_base_url_env_default() {
        let config = Config::from_toml_str(
            "[pipeline]\nbase_url = \"${QUILL_TEST_SURELY_UNSET_BASE:-https://x.test/}\"\n",
        )
        .unwrap();
        assert_eq!(config.pipeline.base_url, "https://x.test/");
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[pipeline]\nbase_url = \"/app/\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.pipeline.base_url, "/app/");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
