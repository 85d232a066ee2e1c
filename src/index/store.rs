//! Flat-file record index.
//!
//! One encoded record per line, in insertion order. Full rewrites go
//! through a temp file in the same directory followed by a rename, so a
//! crash mid-write leaves either the old or the new index on disk:
//! 1. Write to `<index>.tmp.<uuid>`
//! 2. Rename over `<index>`

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::record::{encode, ConfigurationRecord};
use super::session::Session;
use crate::error::IndexError;

/// Reads and writes the record index file.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the data directory and an empty index if either is missing.
    ///
    /// Returns `true` when the index file was created.
    pub fn init(&self) -> Result<bool, IndexError> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }
        fs::write(&self.path, "").map_err(|e| self.write_error(e))?;

        info!(path = ?self.path, "Initialized empty index");
        Ok(true)
    }

    /// Loads every record. A missing index is an empty index.
    pub fn load(&self) -> Result<Vec<ConfigurationRecord>, IndexError> {
        Ok(self.open_session()?.records().to_vec())
    }

    /// Loads the index as a numbered, fingerprinted session.
    pub fn open_session(&self) -> Result<Session, IndexError> {
        let contents = self.read_raw()?.unwrap_or_default();
        let session = Session::from_contents(&contents);
        debug!(path = ?self.path, records = session.len(), "Loaded index");
        Ok(session)
    }

    /// Replaces the whole index with `records`.
    pub fn save(&self, records: &[ConfigurationRecord]) -> Result<(), IndexError> {
        let mut contents = records.iter().map(encode).collect::<Vec<_>>().join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let temp_name = format!("tmp.{}", uuid::Uuid::new_v4());
        let temp_path = self.path.with_extension(temp_name);
        fs::write(&temp_path, &contents).map_err(|e| self.write_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            self.write_error(e)
        })?;

        debug!(path = ?self.path, records = records.len(), "Rewrote index");
        Ok(())
    }

    /// Appends one record without rewriting the existing lines.
    pub fn append(&self, record: &ConfigurationRecord) -> Result<(), IndexError> {
        let needs_newline = match self.read_raw()? {
            Some(existing) => !existing.is_empty() && !existing.ends_with('\n'),
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
                }
                false
            }
        };

        let mut line = String::new();
        if needs_newline {
            line.push('\n');
        }
        line.push_str(&encode(record));
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.write_error(e))?;

        debug!(path = ?self.path, domain = %record.domain, "Appended record to index");
        Ok(())
    }

    /// Returns the current fingerprint of the index file.
    pub fn fingerprint(&self) -> Result<String, IndexError> {
        Ok(super::session::fingerprint(&self.read_raw()?.unwrap_or_default()))
    }

    fn read_raw(&self) -> Result<Option<String>, IndexError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::ReadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn write_error(&self, source: std::io::Error) -> IndexError {
        IndexError::WriteFailed {
            path: self.path.clone(),
            source,
        }
    }
}
