use anyhow::Result;
use clap::Parser;
use proxy_sites::{cli::Cli, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}
