//! Settings data structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the record index inside the data directory.
pub const INDEX_FILE_NAME: &str = "config_index";

/// Root settings structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the record index.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Web server layout and commands.
    #[serde(default)]
    pub nginx: NginxSettings,

    /// Hosts file settings.
    #[serde(default)]
    pub hosts: HostsSettings,

    /// Defaults applied to omitted site fields.
    #[serde(default)]
    pub defaults: SiteDefaults,
}

impl Settings {
    /// Returns the path of the record index.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_FILE_NAME)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            nginx: NginxSettings::default(),
            hosts: HostsSettings::default(),
            defaults: SiteDefaults::default(),
        }
    }
}

/// Web server directories and the external commands run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxSettings {
    /// Directory generated configs are written to.
    #[serde(default = "default_sites_available")]
    pub sites_available: PathBuf,

    /// Directory holding the enable links.
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: PathBuf,

    /// Syntax check command.
    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,

    /// Service reload command.
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,

    /// Service liveness command.
    #[serde(default = "default_status_command")]
    pub status_command: Vec<String>,

    /// Elevated link command used when a direct symlink fails.
    /// The link target and link path are appended. `None` disables the fallback.
    #[serde(default = "default_link_fallback_command")]
    pub link_fallback_command: Option<Vec<String>>,
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            sites_available: default_sites_available(),
            sites_enabled: default_sites_enabled(),
            test_command: default_test_command(),
            reload_command: default_reload_command(),
            status_command: default_status_command(),
            link_fallback_command: default_link_fallback_command(),
        }
    }
}

/// Hosts file location and ownership marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsSettings {
    /// Path to the hosts file.
    #[serde(default = "default_hosts_path")]
    pub path: PathBuf,

    /// Trailing comment identifying lines this tool manages.
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for HostsSettings {
    fn default() -> Self {
        Self {
            path: default_hosts_path(),
            marker: default_marker(),
        }
    }
}

/// Values used when the caller omits a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDefaults {
    /// Backend address the proxy forwards to.
    #[serde(default = "default_loopback")]
    pub backend_host: String,

    /// Address written to the hosts file.
    #[serde(default = "default_loopback")]
    pub ip: String,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            backend_host: default_loopback(),
            ip: default_loopback(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/proxy-sites")
}

fn default_sites_available() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-available")
}

fn default_sites_enabled() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-enabled")
}

fn default_test_command() -> Vec<String> {
    vec!["sudo".into(), "nginx".into(), "-t".into()]
}

fn default_reload_command() -> Vec<String> {
    vec!["sudo".into(), "systemctl".into(), "reload".into(), "nginx".into()]
}

fn default_status_command() -> Vec<String> {
    vec!["systemctl".into(), "is-active".into(), "nginx".into()]
}

fn default_link_fallback_command() -> Option<Vec<String>> {
    Some(vec!["sudo".into(), "ln".into(), "-sf".into()])
}

fn default_hosts_path() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

fn default_marker() -> String {
    "# Added by proxy-sites".to_string()
}

fn default_loopback() -> String {
    "127.0.0.1".to_string()
}
