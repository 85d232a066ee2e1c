//! Settings validation.

use std::path::Path;

use crate::config::model::Settings;

use super::{ValidationIssue, ValidationResult};

/// Validates loaded settings before any command runs against them.
pub fn validate_settings(settings: &Settings) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_absolute(&settings.data_dir, "data_dir", &mut result);
    validate_absolute(&settings.nginx.sites_available, "nginx.sites_available", &mut result);
    validate_absolute(&settings.nginx.sites_enabled, "nginx.sites_enabled", &mut result);
    validate_absolute(&settings.hosts.path, "hosts.path", &mut result);
    validate_index_safe(&settings.nginx.sites_available, "nginx.sites_available", &mut result);

    if settings.nginx.sites_available == settings.nginx.sites_enabled {
        result.add(ValidationIssue::error(
            "nginx.sites_enabled",
            "Available and enabled directories cannot be the same",
        ));
    }

    validate_command(&settings.nginx.test_command, "nginx.test_command", &mut result);
    validate_command(&settings.nginx.reload_command, "nginx.reload_command", &mut result);
    validate_command(&settings.nginx.status_command, "nginx.status_command", &mut result);
    match &settings.nginx.link_fallback_command {
        Some(cmd) => validate_command(cmd, "nginx.link_fallback_command", &mut result),
        None => result.add(ValidationIssue::warning(
            "nginx.link_fallback_command",
            "No elevated link fallback; link failures will only be reported",
        )),
    }

    let marker = settings.hosts.marker.trim();
    if !marker.starts_with('#') {
        result.add(
            ValidationIssue::error(
                "hosts.marker",
                format!("Marker must be a hosts-file comment, got '{}'", marker),
            )
            .with_suggestion("Start the marker with '#'"),
        );
    } else if marker.contains('\t') {
        result.add(ValidationIssue::error("hosts.marker", "Marker cannot contain tabs"));
    }

    let mut defaults = ValidationResult::new();
    super::input::validate_backend_host(&settings.defaults.backend_host, "defaults.backend_host", &mut defaults);
    super::input::validate_ip(&settings.defaults.ip, "defaults.ip", &mut defaults);
    result.extend(defaults);

    result
}

fn validate_absolute(path: &Path, field: &str, result: &mut ValidationResult) {
    if !path.is_absolute() {
        result.add(
            ValidationIssue::error(field, format!("Path must be absolute: '{}'", path.display()))
                .with_suggestion("Use a full path starting with '/'"),
        );
    }
}

/// Config paths are stored unescaped in the index.
fn validate_index_safe(path: &Path, field: &str, result: &mut ValidationResult) {
    if path.to_string_lossy().contains(&[',', '='][..]) {
        result.add(
            ValidationIssue::error(
                field,
                format!("Path cannot contain ',' or '=': '{}'", path.display()),
            )
            .with_suggestion("Choose a directory name without ',' or '='"),
        );
    }
}

fn validate_command(command: &[String], field: &str, result: &mut ValidationResult) {
    if command.first().map_or(true, |program| program.trim().is_empty()) {
        result.add(ValidationIssue::error(field, "Command cannot be empty"));
    }
}
