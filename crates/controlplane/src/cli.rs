//! Command-line interface for `gatehoused`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use gatehouse_domain::config::{Config, ConfigSeverity};

#[derive(Parser)]
#[command(name = "gatehoused", about = "Gatehouse API gateway control plane")]
pub struct Cli {
    /// Path to the TOML configuration file.
    /// Defaults to $GATEHOUSE_CONFIG, then ./gatehouse.toml.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the control-plane server (the default).
    Serve,
    /// Configuration helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version and exit.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration file and exit non-zero on errors.
    Validate,
    /// Print the effective configuration (defaults applied).
    Show,
}

/// Load the configuration. A missing file is not an error: the server can
/// run entirely on defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, PathBuf)> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("GATEHOUSE_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./gatehouse.toml"));

    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        return Ok((Config::default(), path));
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    Ok((config, path))
}

/// `config validate`: print every issue, return false when any is an error.
pub fn validate(config: &Config, path: &Path) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{}: OK", path.display());
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

/// `config show`: dump the effective configuration as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    println!("{rendered}");
    Ok(())
}
