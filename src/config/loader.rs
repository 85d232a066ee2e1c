//! Settings file loading and parsing.

use std::path::Path;

use anyhow::{Context, Result};

use super::model::Settings;
use crate::error::ConfigError;
use crate::validation::{report, settings::validate_settings};

/// Loads the settings file from disk and parses it.
pub fn load_from_path(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let settings: Settings =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(settings)
}

/// Loads and fully validates the settings file.
pub fn load_and_validate(path: &Path) -> Result<Settings> {
    let settings = load_from_path(path).context("Failed to load settings")?;

    let result = validate_settings(&settings);

    for issue in result.warnings() {
        tracing::warn!(
            path = %issue.path,
            message = %issue.message,
            suggestion = ?issue.suggestion,
            "Settings validation warning"
        );
    }

    if !result.is_valid() {
        tracing::error!("{}", report::format_report(&result));
        anyhow::bail!(ConfigError::ValidationFailed {
            error_count: result.error_count()
        });
    }

    Ok(settings)
}

/// Writes default settings to `path` unless a file already exists there.
///
/// Returns `true` when a new file was written.
pub fn write_default(path: &Path, settings: &Settings) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }

    let yaml = serde_yaml::to_string(settings).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(path, yaml).map_err(|e| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(true)
}
