use crate::error::ConfigError;
use crate::modules::DisabledModules;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration, loaded from TOML and environment overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub modules: ModulesConfig,
    pub email: EmailConfig,
    pub login: LoginConfig,
    pub query: QueryConfig,
}

/// Module registration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Names of modules that must not be registered (case-insensitive)
    pub disabled: Vec<String>,
}

/// Email dispatcher settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Account label used in the subject and body
    pub account_alias: String,
    pub recipients: Vec<String>,
    pub sender: String,
    /// HTML body template; the built-in template is used when unset
    pub template: Option<PathBuf>,
    pub transport: TransportConfig,
}

/// Which transport delivers notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Log notifications instead of sending them
    #[default]
    Log,
    /// Pipe notifications to a sendmail-compatible binary
    Sendmail { command: PathBuf },
}

/// Login detail module settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Declare a `ConsoleLogin` query instead of relying on the shared one
    pub declare_filter: bool,
}

/// Settings for the queries handed to the log query collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub log_group_name: Option<String>,
    /// Polling window length used when no explicit start time is given
    pub window_minutes: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            log_group_name: None,
            window_minutes: 5,
        }
    }
}

/// Split a comma-separated list, dropping blank entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Length of a polling window given in minutes
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` when the value is not positive or
/// does not fit in a `TimeDelta`.
pub fn window_length(minutes: i64) -> Result<TimeDelta, ConfigError> {
    if minutes <= 0 {
        return Err(ConfigError::ValidationError(format!(
            "window length must be positive, got {} minutes",
            minutes
        )));
    }
    TimeDelta::try_minutes(minutes).ok_or_else(|| {
        ConfigError::ValidationError(format!("window length of {} minutes is out of range", minutes))
    })
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` when the file cannot be read and
    /// `ConfigError::TomlError` when it is not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup
    ///
    /// Recognised variables: `DISABLED_MODULES`, `ACCOUNT_ALIAS`, `TO_EMAIL`,
    /// `FROM_EMAIL`, `EMAIL_TEMPLATE`, `LOG_GROUP_NAME`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DISABLED_MODULES") {
            self.modules.disabled = split_list(&value);
        }
        if let Some(value) = lookup("ACCOUNT_ALIAS") {
            self.email.account_alias = value;
        }
        if let Some(value) = lookup("TO_EMAIL") {
            self.email.recipients = split_list(&value);
        }
        if let Some(value) = lookup("FROM_EMAIL") {
            self.email.sender = value;
        }
        if let Some(value) = lookup("EMAIL_TEMPLATE") {
            if !value.trim().is_empty() {
                self.email.template = Some(PathBuf::from(value));
            }
        }
        if let Some(value) = lookup("LOG_GROUP_NAME") {
            if !value.trim().is_empty() {
                self.query.log_group_name = Some(value);
            }
        }
    }

    /// Check that the configuration can drive a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        window_length(self.query.window_minutes)?;

        if let Some(bad) = self.email.recipients.iter().find(|r| !r.contains('@')) {
            return Err(ConfigError::ValidationError(format!(
                "invalid recipient address: {}",
                bad
            )));
        }

        if let TransportConfig::Sendmail { .. } = self.email.transport {
            if self.email.recipients.is_empty() {
                return Err(ConfigError::ValidationError(
                    "email.recipients must not be empty when sending mail".to_string(),
                ));
            }
            if !self.email.sender.contains('@') {
                return Err(ConfigError::ValidationError(format!(
                    "invalid sender address: {:?}",
                    self.email.sender
                )));
            }
        }

        Ok(())
    }

    /// Disabled module names as a lookup set
    pub fn disabled_modules(&self) -> DisabledModules {
        DisabledModules::new(&self.modules.disabled)
    }
}
