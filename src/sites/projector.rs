//! Materializes records as config files and enable links.
//!
//! The config file lives at `record.path`; the enable link lives in the
//! enabled directory under the primary domain and points at the config
//! file. The link's presence is the only enabled/disabled signal the web
//! server reads.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NginxSettings;
use crate::error::SiteError;
use crate::index::ConfigurationRecord;
use crate::nginx::run_command;

/// What a link operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LinkChange {
    Created,
    /// Direct creation failed; the elevated command succeeded.
    CreatedWithFallback { direct_error: String },
    AlreadyPresent,
    Removed,
    AlreadyAbsent,
}

/// What a file operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChange {
    Written,
    Moved,
    Removed,
    AlreadyAbsent,
}

/// Per-step results of moving a site to a new primary domain.
#[derive(Debug)]
pub struct RenameOutcome {
    /// Config path after the rename.
    pub new_path: PathBuf,
    pub remove_old_link: Result<LinkChange, SiteError>,
    pub move_config: Result<FileChange, SiteError>,
    /// `None` when the site is disabled and no link should exist.
    pub create_link: Option<Result<LinkChange, SiteError>>,
}

/// Per-step results of removing a site's files.
#[derive(Debug)]
pub struct RemoveOutcome {
    pub config: Result<FileChange, SiteError>,
    pub link: Result<LinkChange, SiteError>,
}

/// Config and link directories plus the elevated link fallback.
#[derive(Debug, Clone)]
pub struct SiteProjector {
    available_dir: PathBuf,
    enabled_dir: PathBuf,
    link_fallback: Option<Vec<String>>,
}

impl SiteProjector {
    pub fn new(settings: &NginxSettings) -> Self {
        Self {
            available_dir: settings.sites_available.clone(),
            enabled_dir: settings.sites_enabled.clone(),
            link_fallback: settings.link_fallback_command.clone(),
        }
    }

    pub fn available_dir(&self) -> &Path {
        &self.available_dir
    }

    pub fn enabled_dir(&self) -> &Path {
        &self.enabled_dir
    }

    /// Default config path for a primary domain.
    pub fn config_path(&self, primary_domain: &str) -> PathBuf {
        self.available_dir.join(primary_domain)
    }

    /// Enable link path for a primary domain.
    pub fn link_path(&self, primary_domain: &str) -> PathBuf {
        self.enabled_dir.join(primary_domain)
    }

    /// Config path a site at `old_path` moves to when renamed.
    pub fn renamed_path(&self, old_path: &Path, new_primary_domain: &str) -> PathBuf {
        old_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(&self.available_dir)
            .join(new_primary_domain)
    }

    /// Writes rendered config text to `path`.
    pub fn write_config(&self, path: &Path, contents: &str) -> Result<FileChange, SiteError> {
        fs::write(path, contents).map_err(|e| SiteError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(?path, "Wrote site config");
        Ok(FileChange::Written)
    }

    /// Writes the config file, then creates the enable link if the record is active.
    pub fn materialize(
        &self,
        record: &ConfigurationRecord,
        contents: &str,
    ) -> (Result<FileChange, SiteError>, Option<Result<LinkChange, SiteError>>) {
        let config = self.write_config(&record.path, contents);
        if config.is_err() || !record.is_active() {
            return (config, None);
        }
        let link = self.enable(record.primary_domain(), &record.path);
        (config, Some(link))
    }

    /// Creates or removes the enable link so that it matches `enabled`.
    pub fn set_enabled(
        &self,
        record: &ConfigurationRecord,
        enabled: bool,
    ) -> Result<LinkChange, SiteError> {
        if enabled {
            self.enable(record.primary_domain(), &record.path)
        } else {
            self.disable(record.primary_domain())
        }
    }

    /// Creates the enable link for `primary_domain` pointing at `target`, unless one exists.
    pub fn enable(&self, primary_domain: &str, target: &Path) -> Result<LinkChange, SiteError> {
        let link = self.link_path(primary_domain);
        if link_exists(&link) {
            debug!(?link, "Enable link already present");
            return Ok(LinkChange::AlreadyPresent);
        }
        self.create_link(target, &link)
    }

    /// Removes the enable link for `primary_domain`, if present.
    pub fn disable(&self, primary_domain: &str) -> Result<LinkChange, SiteError> {
        remove_link(&self.link_path(primary_domain))
    }

    /// Moves a site from `old_path` to a config named after `new_primary_domain`
    /// in the same directory.
    ///
    /// Each step runs even if an earlier one failed.
    pub fn rename(&self, old_path: &Path, new_primary_domain: &str, enabled: bool) -> RenameOutcome {
        let new_path = self.renamed_path(old_path, new_primary_domain);

        let remove_old_link = match old_path.file_name() {
            Some(old_name) => remove_link(&self.enabled_dir.join(old_name)),
            None => Ok(LinkChange::AlreadyAbsent),
        };

        let move_config = if old_path.exists() {
            fs::rename(old_path, &new_path)
                .map(|()| {
                    info!(from = ?old_path, to = ?new_path, "Moved site config");
                    FileChange::Moved
                })
                .map_err(|e| SiteError::MoveFailed {
                    from: old_path.to_path_buf(),
                    to: new_path.clone(),
                    source: e,
                })
        } else {
            Ok(FileChange::AlreadyAbsent)
        };

        let create_link =
            enabled.then(|| self.create_link(&new_path, &self.link_path(new_primary_domain)));

        RenameOutcome {
            new_path,
            remove_old_link,
            move_config,
            create_link,
        }
    }

    /// Deletes the config file and the enable link. Missing targets are fine.
    pub fn remove(&self, record: &ConfigurationRecord) -> RemoveOutcome {
        let config = match fs::remove_file(&record.path) {
            Ok(()) => {
                info!(path = ?record.path, "Removed site config");
                Ok(FileChange::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileChange::AlreadyAbsent),
            Err(e) => Err(SiteError::RemoveFailed {
                path: record.path.clone(),
                source: e,
            }),
        };

        RemoveOutcome {
            config,
            link: self.disable(record.primary_domain()),
        }
    }

    fn create_link(&self, target: &Path, link: &Path) -> Result<LinkChange, SiteError> {
        let direct_error = match std::os::unix::fs::symlink(target, link) {
            Ok(()) => {
                info!(?link, ?target, "Created enable link");
                return Ok(LinkChange::Created);
            }
            Err(e) => e.to_string(),
        };

        warn!(?link, error = %direct_error, "Direct symlink failed");

        let Some(fallback) = &self.link_fallback else {
            return Err(SiteError::LinkFailed {
                link: link.to_path_buf(),
                target: target.to_path_buf(),
                message: direct_error,
            });
        };

        let outcome = run_command(fallback, &[target.as_os_str(), link.as_os_str()]);
        if outcome.success {
            info!(?link, ?target, "Created enable link with fallback command");
            Ok(LinkChange::CreatedWithFallback { direct_error })
        } else {
            Err(SiteError::LinkFailed {
                link: link.to_path_buf(),
                target: target.to_path_buf(),
                message: format!(
                    "{}; fallback '{}' failed: {}",
                    direct_error,
                    fallback.join(" "),
                    outcome.output.trim()
                ),
            })
        }
    }
}

/// True if something (including a dangling symlink) exists at `path`.
pub fn link_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Reads where the link at `path` points, if it is a symlink.
pub fn link_target(path: &Path) -> Option<PathBuf> {
    fs::read_link(path).ok()
}

fn remove_link(link: &Path) -> Result<LinkChange, SiteError> {
    match fs::remove_file(link) {
        Ok(()) => {
            info!(?link, "Removed enable link");
            Ok(LinkChange::Removed)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LinkChange::AlreadyAbsent),
        Err(e) => Err(SiteError::RemoveFailed {
            path: link.to_path_buf(),
            source: e,
        }),
    }
}
