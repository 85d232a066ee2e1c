//! Managed region of the system hosts file.
//!
//! Managed lines have the form `<ip>\t<domain>\t<marker>`. Every mutation
//! reads the whole file, edits the line list, and writes it back; lines
//! this tool does not own are carried through untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HostsSettings;
use crate::error::HostsError;

/// What a hosts mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HostsChange {
    Added { line: String },
    Updated { previous: String, line: String },
    /// A line already mentions the domain; nothing was written.
    Skipped { existing: String },
    Removed { count: usize },
}

/// Reads and rewrites the hosts file.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
    marker: String,
}

impl HostsFile {
    pub fn new(settings: &HostsSettings) -> Self {
        Self {
            path: settings.path.clone(),
            marker: settings.marker.trim().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats the managed line for `domain`.
    pub fn managed_line(&self, ip: &str, domain: &str) -> String {
        format!("{}\t{}\t{}", ip, domain, self.marker)
    }

    /// True if `line` is exactly a managed entry for `domain`, whatever its IP.
    pub fn is_managed_entry(&self, line: &str, domain: &str) -> bool {
        let Some((rest, marker)) = line.trim().rsplit_once('\t') else {
            return false;
        };
        if marker != self.marker {
            return false;
        }
        matches!(rest.split_once('\t'), Some((ip, d)) if !ip.is_empty() && d == domain)
    }

    /// Appends a managed line unless some line already mentions `domain`.
    pub fn add_or_skip(&self, domain: &str, ip: &str) -> Result<HostsChange, HostsError> {
        let mut lines = self.read_lines()?;
        let change = self.push_unless_present(&mut lines, domain, ip);
        if matches!(change, HostsChange::Added { .. }) {
            self.write_lines(&lines)?;
        }
        Ok(change)
    }

    /// Rewrites the first line mentioning `old_domain` as a managed line for
    /// `new_domain`. Falls back to [`HostsFile::add_or_skip`] when nothing matches.
    /// A blank `old_domain` matches nothing.
    pub fn update_by_old_domain(
        &self,
        old_domain: &str,
        new_domain: &str,
        new_ip: &str,
    ) -> Result<HostsChange, HostsError> {
        let mut lines = self.read_lines()?;
        let line = self.managed_line(new_ip, new_domain);

        let old_domain = old_domain.trim();
        let matched = if old_domain.is_empty() {
            None
        } else {
            lines.iter().position(|l| l.contains(old_domain))
        };

        let change = match matched {
            Some(i) => {
                let previous = std::mem::replace(&mut lines[i], line.clone());
                info!(%old_domain, %new_domain, "Updated hosts entry");
                HostsChange::Updated { previous, line }
            }
            None => self.push_unless_present(&mut lines, new_domain, new_ip),
        };

        if !matches!(change, HostsChange::Skipped { .. }) {
            self.write_lines(&lines)?;
        }
        Ok(change)
    }

    /// Drops every managed line for `domain`; other lines mentioning it stay.
    pub fn remove_by_domain(&self, domain: &str) -> Result<HostsChange, HostsError> {
        let lines = self.read_lines()?;
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|l| !self.is_managed_entry(l, domain))
            .collect();
        let count = before - kept.len();

        if count > 0 {
            self.write_lines(&kept)?;
            info!(%domain, count, "Removed hosts entries");
        } else {
            debug!(%domain, "No managed hosts entries to remove");
        }
        Ok(HostsChange::Removed { count })
    }

    /// True if a managed line for `domain` exists.
    pub fn has_managed_entry(&self, domain: &str) -> Result<bool, HostsError> {
        Ok(self
            .read_lines()?
            .iter()
            .any(|l| self.is_managed_entry(l, domain)))
    }

    fn push_unless_present(&self, lines: &mut Vec<String>, domain: &str, ip: &str) -> HostsChange {
        if let Some(existing) = lines.iter().find(|l| l.contains(domain)) {
            warn!(%domain, "Domain already present in hosts file");
            return HostsChange::Skipped {
                existing: existing.clone(),
            };
        }

        let line = self.managed_line(ip, domain);
        lines.push(line.clone());
        info!(%domain, %ip, "Added hosts entry");
        HostsChange::Added { line }
    }

    fn read_lines(&self) -> Result<Vec<String>, HostsError> {
        let content = fs::read_to_string(&self.path).map_err(|e| HostsError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), HostsError> {
        let mut content = lines.join("\n");
        content.push('\n');
        // Written in place: the hosts file is often a bind mount that cannot be replaced by rename.
        fs::write(&self.path, content).map_err(|e| HostsError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MARKER: &str = "# Added by proxy-sites";
    const BASE: &str = "127.0.0.1\tlocalhost\n::1\tlocalhost ip6-localhost\n";

    fn hosts(content: &str) -> (TempDir, HostsFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, content).unwrap();
        let file = HostsFile::new(&HostsSettings {
            path,
            marker: MARKER.to_string(),
        });
        (dir, file)
    }

    fn read(file: &HostsFile) -> String {
        fs::read_to_string(file.path()).unwrap()
    }

    #[test]
    fn add_twice_yields_one_line() {
        let (_dir, file) = hosts(BASE);

        let first = file.add_or_skip("app.test", "127.0.0.1").unwrap();
        assert!(matches!(first, HostsChange::Added { .. }));
        let second = file.add_or_skip("app.test", "127.0.0.1").unwrap();
        assert!(matches!(second, HostsChange::Skipped { .. }));

        let content = read(&file);
        assert_eq!(content.matches("app.test").count(), 1);
        assert!(content.starts_with(BASE));
        assert!(content.ends_with("127.0.0.1\tapp.test\t# Added by proxy-sites\n"));
    }

    #[test]
    fn add_skips_unmanaged_mentions() {
        let (_dir, file) = hosts("10.1.1.1 app.test\n");
        let change = file.add_or_skip("app.test", "127.0.0.1").unwrap();
        assert_eq!(
            change,
            HostsChange::Skipped {
                existing: "10.1.1.1 app.test".to_string()
            }
        );
        assert_eq!(read(&file), "10.1.1.1 app.test\n");
    }

    #[test]
    fn update_rewrites_only_first_match() {
        let content = format!(
            "{}127.0.0.1\ta.test\t{}\n10.0.0.1\ta.test\t{}\n",
            BASE, MARKER, MARKER
        );
        let (_dir, file) = hosts(&content);

        let change = file.update_by_old_domain("a.test", "b.test", "10.9.9.9").unwrap();
        assert!(matches!(change, HostsChange::Updated { .. }));

        let lines: Vec<String> = read(&file).lines().map(str::to_string).collect();
        assert_eq!(lines[2], format!("10.9.9.9\tb.test\t{}", MARKER));
        assert_eq!(lines[3], format!("10.0.0.1\ta.test\t{}", MARKER));
    }

    #[test]
    fn update_without_match_falls_back_to_add() {
        let (_dir, file) = hosts(BASE);
        let change = file.update_by_old_domain("gone.test", "new.test", "127.0.0.1").unwrap();
        assert!(matches!(change, HostsChange::Added { .. }));
        assert!(file.has_managed_entry("new.test").unwrap());
    }

    #[test]
    fn update_with_blank_old_domain_keeps_existing_lines() {
        let (_dir, file) = hosts(BASE);
        let change = file.update_by_old_domain("  ", "b.test", "10.0.0.9").unwrap();
        assert!(matches!(change, HostsChange::Added { .. }));

        let content = read(&file);
        assert!(content.starts_with(BASE));
        assert!(content.ends_with("10.0.0.9\tb.test\t# Added by proxy-sites\n"));
    }

    #[test]
    fn remove_keeps_unrelated_lines() {
        let content = format!(
            "{}127.0.0.1\tapp.test\t{}\n10.0.0.1 app.test # pinned by hand\n127.0.0.1\tother.test\t{}\n",
            BASE, MARKER, MARKER
        );
        let (_dir, file) = hosts(&content);

        assert_eq!(file.remove_by_domain("app.test").unwrap(), HostsChange::Removed { count: 1 });

        let after = read(&file);
        assert!(after.contains("10.0.0.1 app.test # pinned by hand"));
        assert!(after.contains("other.test"));
        assert!(!file.has_managed_entry("app.test").unwrap());
    }

    #[test]
    fn remove_ignores_substring_domains() {
        let content = format!("127.0.0.1\tmy-app.test\t{}\n", MARKER);
        let (_dir, file) = hosts(&content);
        assert_eq!(file.remove_by_domain("app.test").unwrap(), HostsChange::Removed { count: 0 });
        assert_eq!(read(&file), content);
    }

    #[test]
    fn managed_entry_matches_any_ip_and_aliases() {
        let (_dir, file) = hosts("");
        assert!(file.is_managed_entry(&format!("  10.0.0.7\ta.test www.a.test\t{}  ", MARKER), "a.test www.a.test"));
        assert!(!file.is_managed_entry(&format!("10.0.0.7 a.test {}", MARKER), "a.test"));
        assert!(!file.is_managed_entry("10.0.0.7\ta.test\t# someone else", "a.test"));
    }

    #[test]
    fn unreadable_file_is_error() {
        let dir = TempDir::new().unwrap();
        let file = HostsFile::new(&HostsSettings {
            path: dir.path().join("missing"),
            marker: MARKER.to_string(),
        });
        assert!(matches!(
            file.add_or_skip("a.test", "127.0.0.1"),
            Err(HostsError::ReadFailed { .. })
        ));
    }
}
