//! The command-line arguments and configuration system for the `codefix-server` binary.

use clap::Parser;
use codefix_core::config::Config;
use config::FileFormat::Toml;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Command-line arguments for the `codefix-server` binary.
#[derive(Debug, Parser)]
#[command(name = "codefix-server")]
#[command(about = "Relays broken code and its error log to an LLM and returns the fix", long_about = None)]
pub struct Args {
    /// Set a configuration value; format $NAME=$VALUE.
    #[arg(long, short)]
    pub config: Vec<String>,

    /// Address to bind to.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Prints out the location of the config file.
    #[arg(long)]
    pub print_config_path: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse config value {0:?}; no '=' found")]
    MalformedOverride(String),

    #[error("could not determine the user config directory")]
    NoConfigDir,

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Performs parsing and validation of the config; to be called by main() before starting the
/// server.
///
/// Returns the config, or None if a command line flag that calls for an early exit (such as
/// --print-config-path) was provided.
pub fn initialize(args: &Args) -> Result<Option<Config>, LoadError> {
    let dirs = ProjectDirs::from("", "", "codefix");
    if args.print_config_path {
        let dirs = dirs.ok_or(LoadError::NoConfigDir)?;
        println!("Config file location: {:?}", config_file(dirs.config_dir()));
        return Ok(None);
    }
    let config = load_config(args, dirs.as_ref().map(ProjectDirs::config_dir))?;
    config.validate();
    Ok(Some(config))
}

fn load_config(args: &Args, config_dir: Option<&Path>) -> Result<Config, LoadError> {
    let mut settings = config::Config::builder().add_source(config::File::from_str(
        include_str!("../default_config.toml"),
        Toml,
    ));
    if let Some(config_dir) = config_dir {
        settings = settings.add_source(config::File::from(config_file(config_dir)).required(false));
    }
    settings = settings.add_source(config::File::from(PathBuf::from("config.toml")).required(false));

    for config_arg in &args.config {
        let Some((name, value)) = config_arg.split_once('=') else {
            return Err(LoadError::MalformedOverride(config_arg.clone()));
        };
        settings = settings.set_override(name, override_value(value))?;
    }
    if let Some(ref host) = args.host {
        settings = settings.set_override("host", host.as_str())?;
    }
    if let Some(port) = args.port {
        settings = settings.set_override("port", i64::from(port))?;
    }

    Ok(settings.build()?.try_deserialize()?)
}

/// Types a `--config` value. Overrides otherwise arrive as strings, which numeric fields reject
/// once the config passes through a struct with flattened unknown keys.
fn override_value(raw: &str) -> config::Value {
    if let Ok(int) = raw.parse::<i64>() {
        int.into()
    } else if let Ok(flag) = raw.parse::<bool>() {
        flag.into()
    } else {
        raw.into()
    }
}

/// Returns the config file path, given the config directory.
fn config_file(config_dir: &Path) -> PathBuf {
    [config_dir, "server.toml".as_ref()].iter().collect()
}
