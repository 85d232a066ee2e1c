//! Proxy Sites - reverse-proxy site management for nginx.
//!
//! Keeps four representations of each site in step: the record in the
//! index, the generated config file, the enable link, and the hosts entry.

pub mod cli;
pub mod config;
pub mod error;
pub mod hosts;
pub mod index;
pub mod lifecycle;
pub mod nginx;
pub mod sites;
pub mod validation;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cli::{Cli, Commands, DeployArgs, EditArgs, RenderArgs};
use crate::config::Settings;
use crate::error::{AppError, LifecycleError};
use crate::index::{IndexStore, Session};
use crate::lifecycle::{
    format_diagnostics, format_report, CreateRequest, EditRequest, Lifecycle, OperationReport,
};
use crate::nginx::{template, NginxService};
use crate::validation::report::{format_issues, format_report as format_validation};
use crate::validation::{input, ValidationResult};

/// Runs the command selected on the command line.
pub fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    let json = cli.json;
    match cli.command {
        Commands::Init => Ok(init(&cli.config)?),
        Commands::ConfigValidate => validate_config(&cli.config),
        Commands::ConfigShow => show_config(&cli.config),
        Commands::Deploy(args) => deploy(&cli.config, args, json),
        Commands::List => list_sites(&cli.config, json),
        Commands::Show { selector } => show_site(&cli.config, &selector, json),
        Commands::Edit(args) => edit(&cli.config, args, json),
        Commands::Delete { selector } => delete(&cli.config, &selector, json),
        Commands::Toggle { selector } => toggle(&cli.config, &selector, json),
        Commands::Diagnose => diagnose(&cli.config, json),
        Commands::Render(args) => render_preview(args),
    }
}

/// Initializes the tracing subscriber for structured logging on stderr.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Ok(())
}

/// Loads settings and the index for a management session.
fn open(config_path: &Path) -> Result<(Lifecycle<NginxService>, Session)> {
    let settings = config::loader::load_and_validate(config_path)?;
    let lifecycle = Lifecycle::new(&settings, NginxService::new(&settings.nginx));
    let session = lifecycle.open_session().map_err(AppError::from)?;
    Ok((lifecycle, session))
}

/// Writes default settings, the site directories, and an empty index.
fn init(config_path: &Path) -> Result<(), AppError> {
    let settings = if config_path.exists() {
        config::loader::load_from_path(config_path)?
    } else {
        Settings::default()
    };

    if config::loader::write_default(config_path, &settings)? {
        println!("Wrote default settings to {}", config_path.display());
    } else {
        println!("Settings file already exists: {}", config_path.display());
    }

    for dir in [&settings.nginx.sites_available, &settings.nginx.sites_enabled] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            println!("Created {}", dir.display());
        }
    }

    let store = IndexStore::new(settings.index_path());
    if store.init()? {
        println!("Created empty index at {}", store.path().display());
    } else {
        println!("Index already exists: {}", store.path().display());
    }

    info!(config = ?config_path, "Initialization finished");
    Ok(())
}

/// Validates the settings file and reports any issues.
fn validate_config(config_path: &Path) -> Result<()> {
    let settings = config::loader::load_and_validate(config_path)?;
    let result = validation::settings::validate_settings(&settings);

    println!("Settings are valid.");
    let warnings = result.warnings().count();
    if warnings > 0 {
        println!("{}", format_validation(&result));
    }
    Ok(())
}

/// Displays the parsed settings.
fn show_config(config_path: &Path) -> Result<()> {
    let settings = config::loader::load_and_validate(config_path)?;
    let yaml = serde_yaml::to_string(&settings)?;
    println!("{}", yaml);
    Ok(())
}

fn deploy(config_path: &Path, args: DeployArgs, json: bool) -> Result<()> {
    let (lifecycle, mut session) = open(config_path)?;
    let request = CreateRequest {
        domain: args.domain,
        port: args.port,
        backend_host: args.host,
        ip: args.ip,
        kind: args.kind,
        add_hosts_entry: args.hosts,
    };
    finish(lifecycle.create(&mut session, request), json)
}

/// Lists all records with their selection numbers.
fn list_sites(config_path: &Path, json: bool) -> Result<()> {
    let (_, session) = open(config_path)?;

    if json {
        return print_json(&session.records());
    }

    if session.is_empty() {
        println!("No sites configured.");
        return Ok(());
    }

    println!("{:>3}  {:<8}  {:<40}  {:<6}  TYPE", "#", "STATUS", "DOMAIN", "PORT");
    for (i, record) in session.records().iter().enumerate() {
        println!(
            "{:>3}  {:<8}  {:<40}  {:<6}  {}",
            i + 1,
            record.status,
            record.domain,
            record.port,
            record.kind
        );
    }
    Ok(())
}

/// Displays every field of one record.
fn show_site(config_path: &Path, selector: &str, json: bool) -> Result<()> {
    let (_, session) = open(config_path)?;
    let selection = session.resolve(selector).map_err(AppError::from)?;
    let record = session.get(selection).map_err(AppError::from)?;

    if json {
        return print_json(record);
    }

    let created = record
        .created
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Site {}", selection);
    println!("  domain:  {}", record.domain);
    println!("  port:    {}", record.port);
    println!("  host:    {}", record.host);
    println!("  type:    {}", record.kind);
    println!("  ip:      {}", record.ip);
    println!("  path:    {}", record.path.display());
    println!("  status:  {}", record.status);
    println!("  created: {}", created);
    for (key, value) in &record.extra {
        println!("  {}: {}", key, value);
    }
    Ok(())
}

fn edit(config_path: &Path, args: EditArgs, json: bool) -> Result<()> {
    let (lifecycle, mut session) = open(config_path)?;
    let selection = session.resolve(&args.selector).map_err(AppError::from)?;
    let request = EditRequest {
        domain: args.domain,
        port: args.port,
        backend_host: args.host,
        ip: args.ip,
    };
    finish(lifecycle.edit(&mut session, selection, request), json)
}

fn delete(config_path: &Path, selector: &str, json: bool) -> Result<()> {
    let (lifecycle, mut session) = open(config_path)?;
    let selection = session.resolve(selector).map_err(AppError::from)?;
    finish(lifecycle.delete(&mut session, selection), json)
}

fn toggle(config_path: &Path, selector: &str, json: bool) -> Result<()> {
    let (lifecycle, mut session) = open(config_path)?;
    let selection = session.resolve(selector).map_err(AppError::from)?;
    finish(lifecycle.toggle(&mut session, selection), json)
}

/// Reports service state and audits the managed files.
fn diagnose(config_path: &Path, json: bool) -> Result<()> {
    let (lifecycle, session) = open(config_path)?;
    let diagnostics = lifecycle.diagnose(&session);

    if json {
        print_json(&diagnostics)?;
    } else {
        print!("{}", format_diagnostics(&diagnostics));
    }

    if !diagnostics.config_test.success || !diagnostics.audit.is_valid() {
        anyhow::bail!(
            "Diagnostics found {} error(s)",
            diagnostics.audit.error_count() + usize::from(!diagnostics.config_test.success)
        );
    }
    Ok(())
}

/// Prints the rendered config for the given fields.
fn render_preview(args: RenderArgs) -> Result<()> {
    let mut result = ValidationResult::new();
    input::validate_domain(&args.domain, "domain", &mut result);
    input::validate_port(&args.port, "port", &mut result);
    input::validate_backend_host(&args.host, "host", &mut result);
    if !result.is_valid() {
        eprintln!("{}", format_validation(&result));
        anyhow::bail!("Invalid site fields");
    }

    print!("{}", template::render(&args.domain, args.port.trim(), &args.host));
    Ok(())
}

/// Prints an operation report and turns failed steps into a non-zero exit.
fn finish(result: Result<OperationReport, LifecycleError>, json: bool) -> Result<()> {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let LifecycleError::InvalidInput { issues } = &e {
                eprintln!("{}", format_issues(issues));
            }
            return Err(AppError::from(e).into());
        }
    };

    if json {
        print_json(&report)?;
    } else {
        print!("{}", format_report(&report));
    }

    let failures = report.failures().count();
    if failures > 0 {
        anyhow::bail!(
            "{} {} finished with {} failed step(s)",
            report.operation,
            report.domain,
            failures
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
