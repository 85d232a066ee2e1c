//! End-to-end lifecycle tests against a temporary directory tree.
//!
//! Covers:
//! - Create, edit, toggle and delete through the public API
//! - A scripted service standing in for the web server
//! - Real external commands through `NginxService`
//! - Sessions selected by number or domain

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use proxy_sites::config::{HostsSettings, NginxSettings, Settings, SiteDefaults};
use proxy_sites::error::LifecycleError;
use proxy_sites::index::{RecordStatus, Session};
use proxy_sites::lifecycle::{CreateRequest, EditRequest, Lifecycle, Step, StepStatus};
use proxy_sites::nginx::{CommandOutcome, NginxService, ServiceControl};
use proxy_sites::sites::link_exists;
use tempfile::TempDir;

const HOSTS: &str = "127.0.0.1\tlocalhost\n192.168.1.10 nas.lan\n";

/// Service whose configuration test results are queued up front.
/// Once the queue is empty every test passes.
#[derive(Default)]
struct ScriptedService {
    validate_results: RefCell<VecDeque<bool>>,
    reloads: Cell<usize>,
}

impl ScriptedService {
    fn failing_next(count: usize) -> Self {
        let service = Self::default();
        service.validate_results.borrow_mut().extend(std::iter::repeat(false).take(count));
        service
    }
}

impl ServiceControl for ScriptedService {
    fn validate(&self) -> CommandOutcome {
        match self.validate_results.borrow_mut().pop_front() {
            Some(false) => CommandOutcome::failed("nginx: [emerg] unknown directive"),
            _ => CommandOutcome::ok("nginx: configuration file test is successful"),
        }
    }

    fn reload(&self) -> CommandOutcome {
        self.reloads.set(self.reloads.get() + 1);
        CommandOutcome::ok("")
    }

    fn is_active(&self) -> CommandOutcome {
        CommandOutcome::ok("active")
    }
}

struct Env {
    _dir: TempDir,
    settings: Settings,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("available")).unwrap();
        fs::create_dir_all(root.join("enabled")).unwrap();
        fs::write(root.join("hosts"), HOSTS).unwrap();

        let settings = Settings {
            data_dir: root.join("data"),
            nginx: NginxSettings {
                sites_available: root.join("available"),
                sites_enabled: root.join("enabled"),
                test_command: vec!["true".to_string()],
                reload_command: vec!["true".to_string()],
                status_command: vec!["true".to_string()],
                link_fallback_command: None,
            },
            hosts: HostsSettings {
                path: root.join("hosts"),
                marker: "# Added by proxy-sites".to_string(),
            },
            defaults: SiteDefaults::default(),
        };

        Self { _dir: dir, settings }
    }

    fn config(&self, name: &str) -> PathBuf {
        self.settings.nginx.sites_available.join(name)
    }

    fn link(&self, name: &str) -> PathBuf {
        self.settings.nginx.sites_enabled.join(name)
    }

    fn hosts(&self) -> String {
        fs::read_to_string(&self.settings.hosts.path).unwrap()
    }
}

fn deploy<S: ServiceControl>(lifecycle: &Lifecycle<S>, session: &mut Session, domain: &str, port: &str) {
    let report = lifecycle
        .create(
            session,
            CreateRequest {
                domain: domain.to_string(),
                port: port.to_string(),
                add_hosts_entry: true,
                ..CreateRequest::default()
            },
        )
        .unwrap();
    assert!(report.is_success(), "{:?}", report.steps);
}

// =============================================================================
// Full Lifecycle Tests
// =============================================================================

#[test]
fn test_full_lifecycle_keeps_resources_in_step() {
    let env = Env::new();
    let service = ScriptedService::default();
    let lifecycle = Lifecycle::new(&env.settings, service);
    let mut session = lifecycle.open_session().unwrap();

    deploy(&lifecycle, &mut session, "app.test www.app.test", "3000");
    deploy(&lifecycle, &mut session, "api.test", "4000");
    assert_eq!(session.len(), 2);
    assert!(lifecycle.audit(&session).issues().is_empty());

    let selection = session.resolve("app.test").unwrap();
    lifecycle
        .edit(
            &mut session,
            selection,
            EditRequest {
                domain: Some("web.test www.web.test".to_string()),
                ..EditRequest::default()
            },
        )
        .unwrap();
    assert!(env.config("web.test").exists());
    assert!(!env.config("app.test").exists());
    assert!(env.hosts().contains("127.0.0.1\tweb.test www.web.test\t# Added by proxy-sites"));

    let selection = session.resolve("api.test").unwrap();
    lifecycle.toggle(&mut session, selection).unwrap();
    assert!(!link_exists(&env.link("api.test")));
    assert_eq!(session.get(selection).unwrap().status, RecordStatus::Inactive);
    assert!(lifecycle.audit(&session).issues().is_empty());

    lifecycle.delete(&mut session, 1).unwrap();
    lifecycle.delete(&mut session, 1).unwrap();
    assert!(session.is_empty());
    assert_eq!(env.hosts(), HOSTS);
    assert_eq!(fs::read_dir(&env.settings.nginx.sites_available).unwrap().count(), 0);
    assert_eq!(fs::read_dir(&env.settings.nginx.sites_enabled).unwrap().count(), 0);
    assert_eq!(lifecycle.service().reloads.get(), 6);
}

#[test]
fn test_rejected_config_is_not_registered() {
    let env = Env::new();
    let lifecycle = Lifecycle::new(&env.settings, ScriptedService::failing_next(1));
    let mut session = lifecycle.open_session().unwrap();

    let report = lifecycle
        .create(
            &mut session,
            CreateRequest {
                domain: "bad.test".to_string(),
                port: "8080".to_string(),
                add_hosts_entry: true,
                ..CreateRequest::default()
            },
        )
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.status(Step::Index), Some(StepStatus::Skipped));
    assert!(session.is_empty());
    assert_eq!(env.hosts(), HOSTS);
    assert_eq!(lifecycle.service().reloads.get(), 0);

    // The files stay behind; the audit points them out.
    assert!(env.config("bad.test").exists());
    let audit = lifecycle.audit(&session);
    assert_eq!(audit.warnings().count(), 2);
}

#[test]
fn test_unknown_domain_suggests_closest() {
    let env = Env::new();
    let lifecycle = Lifecycle::new(&env.settings, ScriptedService::default());
    let mut session = lifecycle.open_session().unwrap();
    deploy(&lifecycle, &mut session, "grafana.test", "3000");

    match session.resolve("grafna.test") {
        Err(LifecycleError::UnknownDomain { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some("grafana.test"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(session.resolve("1").unwrap(), 1);
    assert!(session.resolve("2").is_err());
}

#[test]
fn test_concurrent_index_change_is_detected() {
    let env = Env::new();
    let lifecycle = Lifecycle::new(&env.settings, ScriptedService::default());
    let mut session = lifecycle.open_session().unwrap();
    deploy(&lifecycle, &mut session, "a.test", "3000");

    let mut other = lifecycle.open_session().unwrap();
    deploy(&lifecycle, &mut other, "b.test", "3001");

    let err = lifecycle.toggle(&mut session, 1).unwrap_err();
    assert!(matches!(err, LifecycleError::StaleSession));

    let mut session = lifecycle.open_session().unwrap();
    assert!(lifecycle.toggle(&mut session, 1).unwrap().is_success());
}

#[test]
fn test_foreign_index_lines_survive_rewrite() {
    let env = Env::new();
    let index = env.settings.index_path();
    fs::create_dir_all(index.parent().unwrap()).unwrap();
    let legacy = format!(
        "domain=old.test,port=9000,host=127.0.0.1,type=proxy,ip=127.0.0.1,path={},owner=ops\n",
        env.config("old.test").display()
    );
    fs::write(&index, &legacy).unwrap();

    let lifecycle = Lifecycle::new(&env.settings, ScriptedService::default());
    let mut session = lifecycle.open_session().unwrap();
    assert!(session.get(1).unwrap().is_active());

    deploy(&lifecycle, &mut session, "new.test", "9001");
    lifecycle.toggle(&mut session, 2).unwrap();

    let contents = fs::read_to_string(&index).unwrap();
    let first = contents.lines().next().unwrap();
    assert!(first.contains("owner=ops"));
    assert!(first.contains("status=active"));
    assert_eq!(session.get(1).unwrap().extra.get("owner").map(String::as_str), Some("ops"));
}

// =============================================================================
// External Command Tests
// =============================================================================

#[test]
fn test_nginx_service_runs_configured_commands() {
    let env = Env::new();
    let service = NginxService::new(&env.settings.nginx);
    let lifecycle = Lifecycle::new(&env.settings, service);
    let mut session = lifecycle.open_session().unwrap();

    deploy(&lifecycle, &mut session, "cmd.test", "3000");
    assert!(lifecycle.diagnose(&session).service.success);
}

#[test]
fn test_nginx_service_reports_command_failure() {
    let mut env = Env::new();
    env.settings.nginx.test_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo 'nginx: [emerg] bad directive' >&2; exit 1".to_string(),
    ];
    let lifecycle = Lifecycle::new(&env.settings, NginxService::new(&env.settings.nginx));
    let mut session = lifecycle.open_session().unwrap();

    let report = lifecycle
        .create(
            &mut session,
            CreateRequest {
                domain: "cmd.test".to_string(),
                port: "3000".to_string(),
                ..CreateRequest::default()
            },
        )
        .unwrap();

    let validate = report.step(Step::Validate).unwrap();
    assert_eq!(validate.status, StepStatus::Failed);
    assert!(validate.detail.contains("bad directive"));
    assert!(session.is_empty());
}
