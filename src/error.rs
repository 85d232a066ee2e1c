//! Error types for the site manager.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationIssue;

/// Top-level application errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Failed to write settings file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings validation failed with {error_count} error(s)")]
    ValidationFailed { error_count: usize },
}

/// Index file read/write errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read index '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write index '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Hosts file read/write errors.
#[derive(Error, Debug)]
pub enum HostsError {
    #[error("Failed to read hosts file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write hosts file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Config file and enable-link errors.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to write config '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to move config '{from}' to '{to}': {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to link '{link}' -> '{target}': {message}")]
    LinkFailed {
        link: PathBuf,
        target: PathBuf,
        message: String,
    },
}

/// Rejections raised before an operation touches any resource.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Input rejected with {} error(s)", .issues.len())]
    InvalidInput { issues: Vec<ValidationIssue> },

    #[error("Selection {selection} is out of range (1-{len})")]
    SelectionOutOfRange { selection: usize, len: usize },

    #[error("No record for domain '{domain}'{}", suggestion_suffix(.suggestion))]
    UnknownDomain {
        domain: String,
        suggestion: Option<String>,
    },

    #[error("Index changed on disk since it was loaded; reload before selecting again")]
    StaleSession,

    #[error("Domain '{domain}' is already managed")]
    DuplicateDomain { domain: String },

    #[error("'{path}' exists and was not generated by proxy-sites")]
    UnmanagedFile { path: PathBuf },

    #[error(transparent)]
    Index(#[from] IndexError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}
