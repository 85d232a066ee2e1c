//! Per-step operation reports.
//!
//! Operations keep going after a step fails, so the caller gets the full
//! list of what was done, skipped, and failed, and can reconcile by hand.

use std::fmt;

use serde::Serialize;

use crate::hosts::HostsChange;
use crate::nginx::CommandOutcome;
use crate::sites::{FileChange, LinkChange};

/// The lifecycle operation a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Edit,
    Delete,
    Toggle,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Delete => "delete",
            Operation::Toggle => "toggle",
        })
    }
}

/// A single resource-touching step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    WriteConfig,
    MoveConfig,
    RemoveConfig,
    RemoveOldLink,
    EnableLink,
    DisableLink,
    Validate,
    Reload,
    Hosts,
    Index,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::WriteConfig => "write_config",
            Step::MoveConfig => "move_config",
            Step::RemoveConfig => "remove_config",
            Step::RemoveOldLink => "remove_old_link",
            Step::EnableLink => "enable_link",
            Step::DisableLink => "disable_link",
            Step::Validate => "validate",
            Step::Reload => "reload",
            Step::Hosts => "hosts",
            Step::Index => "index",
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    /// Nothing to do: already satisfied or not requested.
    Skipped,
    Failed,
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: Step,
    pub status: StepStatus,
    pub detail: String,
}

/// Everything an operation did, in order.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: Operation,
    /// Domain field of the record the operation acted on.
    pub domain: String,
    pub steps: Vec<StepResult>,
    /// Hosts line for the administrator to add by hand when the hosts file
    /// could not be read or written.
    pub manual_hosts_line: Option<String>,
}

impl OperationReport {
    pub fn new(operation: Operation, domain: impl Into<String>) -> Self {
        Self {
            operation,
            domain: domain.into(),
            steps: Vec::new(),
            manual_hosts_line: None,
        }
    }

    pub fn succeeded(&mut self, step: Step, detail: impl Into<String>) {
        self.push(step, StepStatus::Succeeded, detail);
    }

    pub fn skipped(&mut self, step: Step, detail: impl Into<String>) {
        self.push(step, StepStatus::Skipped, detail);
    }

    pub fn failed(&mut self, step: Step, detail: impl Into<String>) {
        self.push(step, StepStatus::Failed, detail);
    }

    fn push(&mut self, step: Step, status: StepStatus, detail: impl Into<String>) {
        let detail = detail.into();
        match status {
            StepStatus::Failed => tracing::warn!(operation = %self.operation, step = step.as_str(), %detail, "Step failed"),
            _ => tracing::debug!(operation = %self.operation, step = step.as_str(), %detail, "Step finished"),
        }
        self.steps.push(StepResult { step, status, detail });
    }

    /// Records a config file step.
    pub fn file<E: fmt::Display>(&mut self, step: Step, result: &Result<FileChange, E>) {
        match result {
            Ok(FileChange::AlreadyAbsent) => self.skipped(step, "already absent"),
            Ok(FileChange::Written) => self.succeeded(step, "written"),
            Ok(FileChange::Moved) => self.succeeded(step, "moved"),
            Ok(FileChange::Removed) => self.succeeded(step, "removed"),
            Err(e) => self.failed(step, e.to_string()),
        }
    }

    /// Records an enable-link step.
    pub fn link<E: fmt::Display>(&mut self, step: Step, result: &Result<LinkChange, E>) {
        match result {
            Ok(LinkChange::Created) => self.succeeded(step, "created"),
            Ok(LinkChange::CreatedWithFallback { direct_error }) => self.succeeded(
                step,
                format!("created with fallback command after: {}", direct_error),
            ),
            Ok(LinkChange::AlreadyPresent) => self.skipped(step, "already present"),
            Ok(LinkChange::Removed) => self.succeeded(step, "removed"),
            Ok(LinkChange::AlreadyAbsent) => self.skipped(step, "already absent"),
            Err(e) => self.failed(step, e.to_string()),
        }
    }

    /// Records a hosts-file step.
    pub fn hosts<E: fmt::Display>(&mut self, result: &Result<HostsChange, E>) {
        match result {
            Ok(HostsChange::Added { line }) => self.succeeded(Step::Hosts, format!("added '{}'", line.escape_default())),
            Ok(HostsChange::Updated { previous, line }) => self.succeeded(
                Step::Hosts,
                format!("replaced '{}' with '{}'", previous.escape_default(), line.escape_default()),
            ),
            Ok(HostsChange::Skipped { existing }) => self.skipped(
                Step::Hosts,
                format!("domain already present: '{}'", existing.escape_default()),
            ),
            Ok(HostsChange::Removed { count: 0 }) => self.skipped(Step::Hosts, "no managed entries"),
            Ok(HostsChange::Removed { count }) => {
                self.succeeded(Step::Hosts, format!("removed {} managed entr(ies)", count))
            }
            Err(e) => self.failed(Step::Hosts, e.to_string()),
        }
    }

    /// Records an external command step.
    pub fn command(&mut self, step: Step, outcome: &CommandOutcome) {
        if outcome.success {
            let detail = outcome.output.trim();
            self.succeeded(step, if detail.is_empty() { "ok" } else { detail });
        } else {
            self.failed(step, outcome.output.trim());
        }
    }

    /// True when no step failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.status == StepStatus::Failed)
    }

    /// Returns the last result recorded for `step`.
    pub fn step(&self, step: Step) -> Option<&StepResult> {
        self.steps.iter().rev().find(|s| s.step == step)
    }

    /// Status of the last result recorded for `step`.
    pub fn status(&self, step: Step) -> Option<StepStatus> {
        self.step(step).map(|s| s.status)
    }
}

/// Formats an operation report for the terminal.
pub fn format_report(report: &OperationReport) -> String {
    let failures = report.failures().count();
    let mut out = if failures == 0 {
        format!("{} {}: completed\n", report.operation, report.domain)
    } else {
        format!(
            "{} {}: completed with {} failed step(s)\n",
            report.operation, report.domain, failures
        )
    };

    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Succeeded => "✓",
            StepStatus::Skipped => "-",
            StepStatus::Failed => "✗",
        };
        let mut lines = step.detail.lines();
        out.push_str(&format!(
            "  {} {:<16} {}\n",
            mark,
            step.step.as_str(),
            lines.next().unwrap_or("")
        ));
        for line in lines {
            out.push_str(&format!("    {:<16} {}\n", "", line));
        }
    }

    if let Some(line) = &report.manual_hosts_line {
        out.push_str("\nAdd this line to the hosts file by hand:\n");
        out.push_str(line);
        out.push('\n');
    }

    out
}
