use crate::config::Config;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Environment variable the cluster harness sets to its log directory
pub const ZOMBIE_DIR_ENV: &str = "MOON_ZOMBIE_DIR";

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the configuration file when given, defaults otherwise
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Resolve the log directory: command line, then configuration, then `MOON_ZOMBIE_DIR`
pub fn resolve_log_dir(cli_dir: Option<&Path>, config: &Config) -> Result<PathBuf> {
    resolve_log_dir_with(cli_dir, config, env::var(ZOMBIE_DIR_ENV).ok())
}

fn resolve_log_dir_with(cli_dir: Option<&Path>, config: &Config, env_dir: Option<String>) -> Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.logs.dir {
        return Ok(dir.clone());
    }
    match env_dir.filter(|d| !d.trim().is_empty()) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Err(eyre!(
            "No log directory given: pass --log-dir, set logs.dir in the configuration or export {}",
            ZOMBIE_DIR_ENV
        )),
    }
}
