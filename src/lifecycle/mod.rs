//! Site lifecycle: create, edit, delete, toggle, and audit.

pub mod audit;
pub mod orchestrator;
pub mod report;
pub mod request;

#[cfg(test)]
pub(crate) mod fixture;

pub use audit::{format_diagnostics, Diagnostics};
pub use orchestrator::Lifecycle;
pub use report::{format_report, Operation, OperationReport, Step, StepResult, StepStatus};
pub use request::{CreateRequest, EditRequest};
