//! In-memory snapshot of the index for one management session.

use sha2::{Digest, Sha256};

use super::record::{decode, ConfigurationRecord};
use crate::error::LifecycleError;

/// Records as loaded from the index, numbered from 1 in file order.
///
/// The numbering is only valid for the file contents the session was
/// built from; the fingerprint lets callers detect that the file moved on.
#[derive(Debug, Clone)]
pub struct Session {
    records: Vec<ConfigurationRecord>,
    fingerprint: String,
}

impl Session {
    /// Builds a session from raw index contents.
    pub fn from_contents(contents: &str) -> Self {
        let records = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(decode)
            .collect();

        Self {
            records,
            fingerprint: fingerprint(contents),
        }
    }

    pub fn records(&self) -> &[ConfigurationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// SHA-256 of the index bytes this session was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the record at a 1-based selection.
    pub fn get(&self, selection: usize) -> Result<&ConfigurationRecord, LifecycleError> {
        selection
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
            .ok_or(LifecycleError::SelectionOutOfRange {
                selection,
                len: self.records.len(),
            })
    }

    /// Returns the 1-based selection of the record with this primary domain.
    pub fn position_of(&self, domain: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.primary_domain() == domain)
            .map(|i| i + 1)
    }

    /// Resolves a selector that is either a 1-based number or a primary domain.
    pub fn resolve(&self, selector: &str) -> Result<usize, LifecycleError> {
        let selector = selector.trim();

        if let Ok(selection) = selector.parse::<usize>() {
            self.get(selection)?;
            return Ok(selection);
        }

        self.position_of(selector)
            .ok_or_else(|| LifecycleError::UnknownDomain {
                domain: selector.to_string(),
                suggestion: self.closest_domain(selector),
            })
    }

    /// Finds the most similar primary domain using Levenshtein distance.
    fn closest_domain(&self, input: &str) -> Option<String> {
        self.records
            .iter()
            .map(|r| r.primary_domain())
            .filter(|d| !d.is_empty())
            .min_by_key(|d| strsim::levenshtein(input, d))
            .filter(|d| strsim::levenshtein(input, d) <= input.len().max(3) / 2)
            .map(str::to_string)
    }
}

/// Computes the SHA-256 of index contents as lowercase hex.
pub fn fingerprint(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hex::encode(hasher.finalize())
}
