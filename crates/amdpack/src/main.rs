use std::path::PathBuf;

use amdpack::{
    bundler::{BundleMode, Bundler},
    config::{CONFIG_FILE_NAME, Config},
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info};

#[derive(Parser, Debug)]
#[command(name = "amdpack", version, about = "Bundle AMD modules into a core bundle and on-demand parts")]
struct Cli {
    /// Configuration file (default: ./amdpack.toml, then the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory, overriding `output.dist`
    #[arg(short, long, global = true)]
    dist: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Write dependency listings only
    Analyse,
    /// Write the core bundle and one bundle per part
    Demand,
    /// Write a single bundle holding every module
    All,
}

impl From<Command> for BundleMode {
    fn from(command: Command) -> Self {
        match command {
            Command::Analyse => Self::Analyse,
            Command::Demand => Self::Demand,
            Command::All => Self::All,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let Some(config_path) = cli.config.clone().or_else(|| Config::discover(&cwd)) else {
        bail!(
            "No configuration found; pass --config or create {}",
            CONFIG_FILE_NAME
        );
    };
    let mut config = Config::load(&config_path)?;
    if let Some(dist) = cli.dist {
        config.output.dist = dist;
    }
    let dist = config.output.dist.clone();

    let mut bundler = Bundler::new(config);
    let report = bundler.run(cli.command.into(), &dist)?;

    for failure in &report.failures {
        error!("{failure}");
    }
    info!(
        "Bundled {} modules into {} files",
        report.plan.all_modules().len(),
        report.written.len()
    );

    if report.has_failures() {
        bail!("{} modules failed to analyze", report.failures.len());
    }
    Ok(())
}

/// Level pinned by `-v`/`-vv`; `None` leaves it to `RUST_LOG`
fn verbosity_level(verbose: u8) -> Option<LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

fn init_logger(verbose: u8) {
    let mut builder = match verbosity_level(verbose) {
        Some(level) => {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(level);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
    };
    builder.format_timestamp(None).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags_pin_the_level() {
        let cli = Cli::try_parse_from(["amdpack", "-vv", "demand"]).expect("valid arguments");
        assert_eq!(verbosity_level(cli.verbose), Some(LevelFilter::Trace));
        assert!(matches!(cli.command, Command::Demand));

        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some(LevelFilter::Debug));
    }
}
