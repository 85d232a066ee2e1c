//! External web-server commands: syntax check, reload, and liveness.

use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NginxSettings;

/// Outcome of an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    /// Whether the command exited successfully.
    pub success: bool,
    /// Combined stdout and stderr, or the spawn error.
    pub output: String,
}

impl CommandOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Capabilities the lifecycle needs from the running web server.
///
/// Calls are synchronous and safe to repeat; a failure never touches
/// files that were already written.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceControl {
    /// Checks the syntax of the full server configuration.
    fn validate(&self) -> CommandOutcome;

    /// Applies the current configuration to the running service.
    fn reload(&self) -> CommandOutcome;

    /// Reports whether the service is running.
    fn is_active(&self) -> CommandOutcome;
}

/// `ServiceControl` backed by the commands in the settings file.
#[derive(Debug, Clone)]
pub struct NginxService {
    test_command: Vec<String>,
    reload_command: Vec<String>,
    status_command: Vec<String>,
}

impl NginxService {
    pub fn new(settings: &NginxSettings) -> Self {
        Self {
            test_command: settings.test_command.clone(),
            reload_command: settings.reload_command.clone(),
            status_command: settings.status_command.clone(),
        }
    }
}

impl ServiceControl for NginxService {
    fn validate(&self) -> CommandOutcome {
        let outcome = run_command(&self.test_command, &[]);
        if outcome.success {
            info!("Configuration test passed");
        } else {
            warn!(output = %outcome.output, "Configuration test failed");
        }
        outcome
    }

    fn reload(&self) -> CommandOutcome {
        let outcome = run_command(&self.reload_command, &[]);
        if outcome.success {
            info!("Service reloaded");
        } else {
            warn!(output = %outcome.output, "Service reload failed");
        }
        outcome
    }

    fn is_active(&self) -> CommandOutcome {
        run_command(&self.status_command, &[])
    }
}

/// Runs `argv` followed by `extra` arguments, capturing combined output.
pub fn run_command(argv: &[String], extra: &[&std::ffi::OsStr]) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::failed("empty command");
    };

    let mut cmd = Command::new(program);
    cmd.args(args).args(extra);

    debug!(cmd = ?cmd, "Running external command");

    let output = match cmd.stdin(Stdio::null()).output() {
        Ok(output) => output,
        Err(e) => {
            return CommandOutcome::failed(format!("failed to run '{}': {}", program, e));
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        CommandOutcome::ok(text)
    } else {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        if text.trim().is_empty() {
            text = format!("'{}' exited with {}", program, code);
        }
        CommandOutcome::failed(text)
    }
}
