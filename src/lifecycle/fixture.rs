//! Temporary directory layout shared by the lifecycle tests.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use super::Lifecycle;
use crate::config::{HostsSettings, NginxSettings, Settings, SiteDefaults};
use crate::nginx::service::MockServiceControl;
use crate::nginx::CommandOutcome;

pub(crate) const HOSTS_BASE: &str = "127.0.0.1\tlocalhost\n10.0.0.5 pinned.test\n";

pub(crate) struct Fixture {
    _dir: TempDir,
    pub settings: Settings,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["data", "sites-available", "sites-enabled"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("hosts"), HOSTS_BASE).unwrap();

        let settings = Settings {
            data_dir: root.join("data"),
            nginx: NginxSettings {
                sites_available: root.join("sites-available"),
                sites_enabled: root.join("sites-enabled"),
                link_fallback_command: None,
                ..NginxSettings::default()
            },
            hosts: HostsSettings {
                path: root.join("hosts"),
                ..HostsSettings::default()
            },
            defaults: SiteDefaults::default(),
        };

        Self { _dir: dir, settings }
    }

    pub fn lifecycle(&self, service: MockServiceControl) -> Lifecycle<MockServiceControl> {
        Lifecycle::new(&self.settings, service)
    }

    pub fn hosts(&self) -> String {
        fs::read_to_string(&self.settings.hosts.path).unwrap()
    }

    pub fn index(&self) -> String {
        fs::read_to_string(self.settings.index_path()).unwrap_or_default()
    }

    pub fn available(&self, name: &str) -> PathBuf {
        self.settings.nginx.sites_available.join(name)
    }

    pub fn enabled(&self, name: &str) -> PathBuf {
        self.settings.nginx.sites_enabled.join(name)
    }
}

/// A service whose configuration test passes or fails; reload and status succeed.
pub(crate) fn service(config_ok: bool) -> MockServiceControl {
    let mut mock = MockServiceControl::new();
    mock.expect_validate().returning(move || {
        if config_ok {
            CommandOutcome::ok("nginx: configuration file test is successful")
        } else {
            CommandOutcome::failed("nginx: [emerg] invalid port in upstream")
        }
    });
    mock.expect_reload().returning(|| CommandOutcome::ok(""));
    mock.expect_is_active().returning(|| CommandOutcome::ok("active"));
    mock
}
