//! Configuration loading and validation.

mod validation;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Legacy database the codelists and agendas are read from.
    pub source: DatabaseConfig,

    /// Database of the new application.
    pub target: DatabaseConfig,

    /// Table name prefixes of both schemas.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Business constants applied while transforming rows.
    #[serde(default)]
    pub params: BusinessParams,
}

/// A SQLite database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl DatabaseConfig {
    /// Name used in log lines.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_source_codelist_prefix")]
    pub source_codelist_prefix: String,
    #[serde(default = "default_source_agenda_prefix")]
    pub source_agenda_prefix: String,
    #[serde(default = "default_target_codelist_prefix")]
    pub target_codelist_prefix: String,
    #[serde(default = "default_target_agenda_prefix")]
    pub target_agenda_prefix: String,
    /// Root of the register table listing all codelists.
    #[serde(default = "default_codelist_register")]
    pub codelist_register: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            source_codelist_prefix: default_source_codelist_prefix(),
            source_agenda_prefix: default_source_agenda_prefix(),
            target_codelist_prefix: default_target_codelist_prefix(),
            target_agenda_prefix: default_target_agenda_prefix(),
            codelist_register: default_codelist_register(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessParams {
    /// Acting user id stamped on migrated rows unless overridden on the command line.
    #[serde(default = "default_user")]
    pub user: i64,

    /// Target id of the legacy currency (SKK).
    #[serde(default = "default_legacy_currency_id")]
    pub legacy_currency_id: i64,

    /// Fixed conversion rate from the legacy currency to EUR.
    #[serde(default = "default_legacy_currency_rate")]
    pub legacy_currency_rate: f64,

    /// Author line spreadsheet apps prepend to cell comments, e.g. "Jane Doe:".
    #[serde(default)]
    pub annotation_signature: Option<String>,
}

impl Default for BusinessParams {
    fn default() -> Self {
        Self {
            user: default_user(),
            legacy_currency_id: default_legacy_currency_id(),
            legacy_currency_rate: default_legacy_currency_rate(),
            annotation_signature: None,
        }
    }
}

fn default_source_codelist_prefix() -> String {
    "jos_codelist_".into()
}

fn default_source_agenda_prefix() -> String {
    "jos_familylist_".into()
}

fn default_target_codelist_prefix() -> String {
    "lgbj_gbjcodes_".into()
}

fn default_target_agenda_prefix() -> String {
    "lgbj_gbjfamily_".into()
}

fn default_codelist_register() -> String {
    "codebooks".into()
}

fn default_user() -> i64 {
    820
}

fn default_legacy_currency_id() -> i64 {
    1
}

fn default_legacy_currency_rate() -> f64 {
    30.126
}

impl Config {
    /// Configuration with default naming and params for the given stores.
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: DatabaseConfig {
                path: source.into(),
            },
            target: DatabaseConfig {
                path: target.into(),
            },
            naming: NamingConfig::default(),
            params: BusinessParams::default(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg = Config::from_yaml(
            "source:\n  path: legacy.sqlite3\ntarget:\n  path: chronicle.sqlite3\n",
        )
        .expect("parse");
        assert_eq!(cfg.naming.source_codelist_prefix, "jos_codelist_");
        assert_eq!(cfg.naming.target_agenda_prefix, "lgbj_gbjfamily_");
        assert_eq!(cfg.params.user, 820);
        assert_eq!(cfg.params.legacy_currency_id, 1);
        assert_eq!(cfg.params.legacy_currency_rate, 30.126);
        assert_eq!(cfg.source.name(), "legacy");
    }

    #[test]
    fn params_override() {
        let cfg = Config::from_yaml(
            "source:\n  path: a.db\ntarget:\n  path: b.db\nparams:\n  user: 42\n  annotation_signature: \"Jane Doe:\"\n",
        )
        .expect("parse");
        assert_eq!(cfg.params.user, 42);
        assert_eq!(cfg.params.annotation_signature.as_deref(), Some("Jane Doe:"));
        assert_eq!(cfg.params.legacy_currency_rate, 30.126);
    }
}
