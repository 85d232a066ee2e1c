//! Read-only consistency audit and service diagnostics.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::orchestrator::Lifecycle;
use crate::index::Session;
use crate::nginx::{template, CommandOutcome, ServiceControl};
use crate::sites::{link_exists, link_target};
use crate::validation::report::format_report;
use crate::validation::{ValidationIssue, ValidationResult};

/// Service state plus the audit of the managed resources.
#[derive(Debug, Serialize)]
pub struct Diagnostics {
    pub service: CommandOutcome,
    pub config_test: CommandOutcome,
    pub audit: ValidationResult,
}

impl<S: ServiceControl> Lifecycle<S> {
    /// Compares every record with its config file, enable link, and hosts
    /// entry, then looks for generated files no record owns. Writes nothing.
    pub fn audit(&self, session: &Session) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut hosts_unreadable = false;

        for (i, record) in session.records().iter().enumerate() {
            let field = format!("records[{}]", i + 1);

            if record.path.as_os_str().is_empty() {
                result.add(ValidationIssue::error(
                    format!("{}.path", field),
                    format!("'{}' has no config path", record.domain),
                ));
                continue;
            }

            let primary = record.primary_domain();
            if !record.path.is_file() {
                result.add(
                    ValidationIssue::error(
                        format!("{}.path", field),
                        format!("config file '{}' is missing", record.path.display()),
                    )
                    .with_suggestion(format!("edit {} to regenerate it", primary)),
                );
            }
            if record.file_name() != Some(primary) {
                result.add(ValidationIssue::warning(
                    format!("{}.path", field),
                    format!(
                        "config file name '{}' differs from primary domain '{}'",
                        record.path.display(),
                        primary
                    ),
                ));
            }

            let link = self.projector().link_path(primary);
            let linked = link_exists(&link);
            if record.is_active() && !linked {
                result.add(
                    ValidationIssue::error(
                        format!("{}.status", field),
                        format!("'{}' is active but '{}' does not exist", primary, link.display()),
                    )
                    .with_suggestion(format!("toggle {} twice to recreate the link", primary)),
                );
            } else if !record.is_active() && linked {
                result.add(
                    ValidationIssue::error(
                        format!("{}.status", field),
                        format!("'{}' is inactive but '{}' exists", primary, link.display()),
                    )
                    .with_suggestion(format!("toggle {} twice to remove the link", primary)),
                );
            }

            if let Some(target) = resolved_target(&link) {
                if target != record.path {
                    result.add(ValidationIssue::warning(
                        format!("{}.link", field),
                        format!(
                            "'{}' points at '{}' instead of '{}'",
                            link.display(),
                            target.display(),
                            record.path.display()
                        ),
                    ));
                }
            }

            if record.is_active() && !hosts_unreadable {
                match self.hosts().has_managed_entry(&record.domain) {
                    Ok(true) => {}
                    Ok(false) => result.add(ValidationIssue::warning(
                        format!("{}.hosts", field),
                        format!("no managed hosts entry for '{}'", record.domain),
                    )),
                    Err(e) => {
                        hosts_unreadable = true;
                        result.add(ValidationIssue::warning("hosts", e.to_string()));
                    }
                }
            }
        }

        self.audit_orphans(session, &mut result);

        info!(
            records = session.len(),
            errors = result.error_count(),
            "Audit finished"
        );
        result
    }

    /// Runs the liveness check, the configuration test, and the audit.
    pub fn diagnose(&self, session: &Session) -> Diagnostics {
        Diagnostics {
            service: self.service().is_active(),
            config_test: self.service().validate(),
            audit: self.audit(session),
        }
    }

    fn audit_orphans(&self, session: &Session, result: &mut ValidationResult) {
        let available = self.projector().available_dir();
        let enabled = self.projector().enabled_dir();

        let owned_paths: HashSet<&Path> = session.records().iter().map(|r| r.path.as_path()).collect();
        let owned_names: HashSet<&str> = session.records().iter().map(|r| r.primary_domain()).collect();

        for path in entries(available) {
            if owned_paths.contains(path.as_path()) || !is_generated_file(&path) {
                continue;
            }
            result.add(
                ValidationIssue::warning(
                    "sites_available",
                    format!("generated config '{}' has no record", path.display()),
                )
                .with_suggestion("delete it or deploy the domain again"),
            );
        }

        for link in entries(enabled) {
            let owned = link
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| owned_names.contains(n));
            if owned {
                continue;
            }
            let Some(target) = resolved_target(&link) else {
                continue;
            };
            let dangling_managed = !target.exists() && target.parent() == Some(available);
            if dangling_managed || is_generated_file(&target) {
                result.add(ValidationIssue::warning(
                    "sites_enabled",
                    format!(
                        "enable link '{}' -> '{}' has no record",
                        link.display(),
                        target.display()
                    ),
                ));
            }
        }
    }
}

/// Formats diagnostics for the terminal.
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut out = String::new();

    let service = if diagnostics.service.success { "running" } else { "not running" };
    out.push_str(&format!("Service:      {}\n", service));
    push_output(&mut out, &diagnostics.service.output);

    let test = if diagnostics.config_test.success { "passed" } else { "failed" };
    out.push_str(&format!("Config test:  {}\n", test));
    push_output(&mut out, &diagnostics.config_test.output);

    out.push_str("\nConsistency:\n");
    out.push_str(&format_report(&diagnostics.audit));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_output(out: &mut String, output: &str) {
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
}

/// Direct children of `dir`; a missing directory yields nothing.
fn entries(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect()
}

/// Link target with relative targets resolved against the link's directory.
fn resolved_target(link: &Path) -> Option<PathBuf> {
    let target = link_target(link)?;
    if target.is_relative() {
        Some(link.parent().map(|p| p.join(&target)).unwrap_or(target))
    } else {
        Some(target)
    }
}

fn is_generated_file(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(contents) => template::is_generated(&contents),
        Err(e) => {
            debug!(?path, error = %e, "Skipping unreadable file");
            false
        }
    }
}
