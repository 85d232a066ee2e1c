//! Create, edit, delete, and toggle across the index, config files,
//! enable links, and the hosts file.
//!
//! Each operation rejects bad input and stale sessions before touching
//! anything. Once the first resource is touched there is no rollback:
//! later steps run best-effort and every outcome lands in the report.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use super::report::{Operation, OperationReport, Step, StepStatus};
use super::request::{provided, CreateRequest, EditRequest};
use crate::config::{Settings, SiteDefaults};
use crate::error::LifecycleError;
use crate::hosts::HostsFile;
use crate::index::{primary_domain, ConfigurationRecord, IndexStore, Session};
use crate::nginx::{template, ServiceControl};
use crate::sites::SiteProjector;
use crate::validation::{input, ValidationResult};

/// Coordinates the four representations of a site.
pub struct Lifecycle<S> {
    store: IndexStore,
    projector: SiteProjector,
    hosts: HostsFile,
    service: S,
    defaults: SiteDefaults,
}

impl<S: ServiceControl> Lifecycle<S> {
    /// Builds a lifecycle from settings and a service capability.
    pub fn new(settings: &Settings, service: S) -> Self {
        Self {
            store: IndexStore::new(settings.index_path()),
            projector: SiteProjector::new(&settings.nginx),
            hosts: HostsFile::new(&settings.hosts),
            service,
            defaults: settings.defaults.clone(),
        }
    }

    pub fn projector(&self) -> &SiteProjector {
        &self.projector
    }

    pub fn hosts(&self) -> &HostsFile {
        &self.hosts
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Loads a fresh session from the index.
    pub fn open_session(&self) -> Result<Session, LifecycleError> {
        Ok(self.store.open_session()?)
    }

    /// Deploys a new site.
    ///
    /// The index is only written once the server accepts the generated
    /// config; a failed check leaves the config file and link on disk.
    pub fn create(
        &self,
        session: &mut Session,
        request: CreateRequest,
    ) -> Result<OperationReport, LifecycleError> {
        let domain = normalize_domain(&request.domain);
        let port = request.port.trim().to_string();
        let host = provided(&request.backend_host)
            .unwrap_or(self.defaults.backend_host.as_str())
            .to_string();
        let ip = provided(&request.ip).unwrap_or(self.defaults.ip.as_str()).to_string();

        let mut checks = input::validate_site(&domain, &port, &host, &ip);
        if let Some(kind) = provided(&request.kind) {
            input::validate_kind(kind, &mut checks);
        }
        reject_invalid(checks)?;

        self.ensure_fresh(session)?;

        let primary = primary_domain(&domain).to_string();
        if session.position_of(&primary).is_some() {
            return Err(LifecycleError::DuplicateDomain { domain: primary });
        }
        let config_path = self.projector.config_path(&primary);
        ensure_unclaimed(&config_path)?;

        let record = ConfigurationRecord::new(
            domain.as_str(),
            port.as_str(),
            host.as_str(),
            ip.as_str(),
            config_path,
            Utc::now().timestamp_millis(),
        );
        let mut report = OperationReport::new(Operation::Create, domain.as_str());

        let contents = template::render(&record.domain, &record.port, &record.host);
        let (config, link) = self.projector.materialize(&record, &contents);
        report.file(Step::WriteConfig, &config);
        if config.is_err() {
            report.skipped(Step::Index, "not registered: config could not be written");
            return Ok(report);
        }
        if let Some(link) = link {
            report.link(Step::EnableLink, &link);
        }

        let validation = self.service.validate();
        report.command(Step::Validate, &validation);
        if !validation.success {
            report.skipped(Step::Index, "not registered: configuration test failed");
            return Ok(report);
        }

        report.command(Step::Reload, &self.service.reload());

        if request.add_hosts_entry {
            let result = self.hosts.add_or_skip(&record.domain, &record.ip);
            if result.is_err() {
                report.manual_hosts_line = Some(self.hosts.managed_line(&record.ip, &record.domain));
            }
            report.hosts(&result);
        } else {
            report.skipped(Step::Hosts, "not requested");
        }

        match self.store.append(&record) {
            Ok(()) => report.succeeded(Step::Index, "registered"),
            Err(e) => report.failed(Step::Index, e.to_string()),
        }

        info!(domain = %record.domain, success = report.is_success(), "Create finished");
        self.refresh(session, &mut report);
        Ok(report)
    }

    /// Changes the fields of the record at `selection`.
    ///
    /// The index is rewritten before the configuration test, so a rejected
    /// edit leaves the new values registered while the server keeps running
    /// the last config it accepted.
    pub fn edit(
        &self,
        session: &mut Session,
        selection: usize,
        request: EditRequest,
    ) -> Result<OperationReport, LifecycleError> {
        self.ensure_fresh(session)?;
        let original = session.get(selection)?.clone();

        let domain = provided(&request.domain)
            .map(normalize_domain)
            .unwrap_or_else(|| original.domain.clone());
        let port = provided(&request.port)
            .unwrap_or(original.port.as_str())
            .to_string();
        let host = provided(&request.backend_host)
            .or_else(|| non_empty(&original.host))
            .unwrap_or(self.defaults.backend_host.as_str())
            .to_string();
        let ip = provided(&request.ip)
            .or_else(|| non_empty(&original.ip))
            .unwrap_or(self.defaults.ip.as_str())
            .to_string();

        reject_invalid(input::validate_site(&domain, &port, &host, &ip))?;

        let old_primary = original.primary_domain().to_string();
        let new_primary = primary_domain(&domain).to_string();
        if new_primary != old_primary {
            if let Some(other) = session.position_of(&new_primary) {
                if other != selection {
                    return Err(LifecycleError::DuplicateDomain { domain: new_primary });
                }
            }
            ensure_unclaimed(&self.projector.renamed_path(&original.path, &new_primary))?;
        }

        let mut report = OperationReport::new(Operation::Edit, domain.as_str());
        let mut updated = original.clone();

        if new_primary != old_primary {
            let outcome = self
                .projector
                .rename(&original.path, &new_primary, original.is_active());
            report.link(Step::RemoveOldLink, &outcome.remove_old_link);
            report.file(Step::MoveConfig, &outcome.move_config);
            if let Some(link) = &outcome.create_link {
                report.link(Step::EnableLink, link);
            }
            updated.path = outcome.new_path;
        }

        updated.domain = domain;
        updated.port = port;
        updated.host = host;
        updated.ip = ip;

        let contents = template::render(&updated.domain, &updated.port, &updated.host);
        report.file(Step::WriteConfig, &self.projector.write_config(&updated.path, &contents));

        let mut records = session.records().to_vec();
        records[selection - 1] = updated.clone();
        match self.store.save(&records) {
            Ok(()) => report.succeeded(Step::Index, "record updated"),
            Err(e) => report.failed(Step::Index, e.to_string()),
        }

        let hosts = self
            .hosts
            .update_by_old_domain(&original.domain, &updated.domain, &updated.ip);
        if hosts.is_err() {
            report.manual_hosts_line = Some(self.hosts.managed_line(&updated.ip, &updated.domain));
        }
        report.hosts(&hosts);

        self.validate_and_reload(&mut report);

        info!(
            from = %original.domain,
            to = %updated.domain,
            success = report.is_success(),
            "Edit finished"
        );
        self.refresh(session, &mut report);
        Ok(report)
    }

    /// Removes the record at `selection` and everything derived from it.
    pub fn delete(
        &self,
        session: &mut Session,
        selection: usize,
    ) -> Result<OperationReport, LifecycleError> {
        self.ensure_fresh(session)?;
        let record = session.get(selection)?.clone();
        let mut report = OperationReport::new(Operation::Delete, record.domain.as_str());

        let removed = self.projector.remove(&record);
        report.file(Step::RemoveConfig, &removed.config);
        report.link(Step::DisableLink, &removed.link);

        report.hosts(&self.hosts.remove_by_domain(&record.domain));

        let mut records = session.records().to_vec();
        records.remove(selection - 1);
        match self.store.save(&records) {
            Ok(()) => report.succeeded(Step::Index, "record removed"),
            Err(e) => report.failed(Step::Index, e.to_string()),
        }

        report.command(Step::Reload, &self.service.reload());

        info!(domain = %record.domain, success = report.is_success(), "Delete finished");
        self.refresh(session, &mut report);
        Ok(report)
    }

    /// Flips the record at `selection` between active and inactive.
    pub fn toggle(
        &self,
        session: &mut Session,
        selection: usize,
    ) -> Result<OperationReport, LifecycleError> {
        self.ensure_fresh(session)?;
        let mut record = session.get(selection)?.clone();
        let mut report = OperationReport::new(Operation::Toggle, record.domain.as_str());

        record.status = record.status.toggled();
        let enable = record.is_active();
        let step = if enable { Step::EnableLink } else { Step::DisableLink };
        report.link(step, &self.projector.set_enabled(&record, enable));

        let mut records = session.records().to_vec();
        records[selection - 1] = record.clone();
        match self.store.save(&records) {
            Ok(()) => report.succeeded(Step::Index, format!("status set to {}", record.status)),
            Err(e) => report.failed(Step::Index, e.to_string()),
        }

        report.command(Step::Reload, &self.service.reload());

        info!(domain = %record.domain, status = %record.status, "Toggle finished");
        self.refresh(session, &mut report);
        Ok(report)
    }

    fn validate_and_reload(&self, report: &mut OperationReport) {
        let validation = self.service.validate();
        report.command(Step::Validate, &validation);
        if validation.success {
            report.command(Step::Reload, &self.service.reload());
        } else {
            report.skipped(Step::Reload, "configuration test failed");
        }
    }

    /// Rejects a session whose index file has changed since it was loaded.
    fn ensure_fresh(&self, session: &Session) -> Result<(), LifecycleError> {
        if self.store.fingerprint()? != session.fingerprint() {
            return Err(LifecycleError::StaleSession);
        }
        Ok(())
    }

    /// Replaces `session` with the index as it is now on disk.
    fn refresh(&self, session: &mut Session, report: &mut OperationReport) {
        match self.store.open_session() {
            Ok(fresh) => *session = fresh,
            Err(e) => {
                warn!(error = %e, "Failed to reload index after mutation");
                if report.status(Step::Index) != Some(StepStatus::Failed) {
                    report.failed(Step::Index, format!("reload after write failed: {}", e));
                }
            }
        }
    }
}

fn reject_invalid(result: ValidationResult) -> Result<(), LifecycleError> {
    if result.is_valid() {
        Ok(())
    } else {
        Err(LifecycleError::InvalidInput {
            issues: result.into_issues(),
        })
    }
}

/// Rejects a config path already taken by a file this tool did not generate.
fn ensure_unclaimed(path: &Path) -> Result<(), LifecycleError> {
    let claimed = match fs::read_to_string(path) {
        Ok(contents) => !template::is_generated(&contents),
        Err(e) => e.kind() != ErrorKind::NotFound,
    };
    if claimed {
        warn!(?path, "Refusing to overwrite unmanaged config");
        return Err(LifecycleError::UnmanagedFile {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Collapses runs of whitespace between server names.
fn normalize_domain(domain: &str) -> String {
    domain.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
