//! Web server integration: config templating and service commands.

pub mod service;
pub mod template;

pub use service::{run_command, CommandOutcome, NginxService, ServiceControl};
