//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }
    if config.target.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("target.path is required".into()));
    }
    if config.source.path == config.target.path {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    let naming = &config.naming;
    for (key, value) in [
        ("naming.source_codelist_prefix", &naming.source_codelist_prefix),
        ("naming.source_agenda_prefix", &naming.source_agenda_prefix),
        ("naming.target_codelist_prefix", &naming.target_codelist_prefix),
        ("naming.target_agenda_prefix", &naming.target_agenda_prefix),
        ("naming.codelist_register", &naming.codelist_register),
    ] {
        if value.is_empty() {
            return Err(MigrateError::Config(format!("{key} must not be empty")));
        }
    }
    if naming.source_codelist_prefix == naming.source_agenda_prefix {
        return Err(MigrateError::Config(
            "codelist and agenda source prefixes must differ".into(),
        ));
    }

    if !(config.params.legacy_currency_rate > 0.0) {
        return Err(MigrateError::Config(format!(
            "params.legacy_currency_rate must be positive, got {}",
            config.params.legacy_currency_rate
        )));
    }

    Ok(())
}
