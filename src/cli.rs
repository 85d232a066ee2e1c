//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Manages reverse-proxy sites for nginx: config files, enable links,
/// the record index, and hosts entries.
#[derive(Parser, Debug)]
#[command(name = "proxy-sites", version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file.
    #[arg(
        short,
        long,
        default_value = "/etc/proxy-sites/settings.yaml",
        env = "PROXY_SITES_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write default settings and create the index and site directories.
    Init,

    /// Validate the settings file.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the parsed settings.
    #[command(name = "config-show")]
    ConfigShow,

    /// Generate, enable, and register a new site.
    Deploy(DeployArgs),

    /// List managed sites.
    List,

    /// Show every field of one site.
    Show {
        /// Site number from `list`, or its primary domain.
        selector: String,
    },

    /// Change the domain, port, backend host, or IP of a site.
    Edit(EditArgs),

    /// Remove a site's config, link, hosts entry, and record.
    Delete {
        /// Site number from `list`, or its primary domain.
        selector: String,
    },

    /// Enable a disabled site or disable an enabled one.
    Toggle {
        /// Site number from `list`, or its primary domain.
        selector: String,
    },

    /// Check the service and audit managed files against the index.
    Diagnose,

    /// Print the config that would be generated, without writing it.
    Render(RenderArgs),
}

/// Arguments for the deploy subcommand.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Server names, space separated; the first one names the files.
    #[arg(long)]
    pub domain: String,

    /// Backend port.
    #[arg(long)]
    pub port: String,

    /// Backend host (defaults to the configured backend host).
    #[arg(long)]
    pub host: Option<String>,

    /// Address for the hosts entry (defaults to the configured IP).
    #[arg(long)]
    pub ip: Option<String>,

    /// Service type.
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Add a hosts-file entry for the domain.
    #[arg(long, default_value = "false")]
    pub hosts: bool,
}

/// Arguments for the edit subcommand. Omitted fields keep their value.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Site number from `list`, or its primary domain.
    pub selector: String,

    #[arg(long)]
    pub domain: Option<String>,

    #[arg(long)]
    pub port: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub ip: Option<String>,
}

/// Arguments for the render subcommand.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(long)]
    pub domain: String,

    #[arg(long)]
    pub port: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}
