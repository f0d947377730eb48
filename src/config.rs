//! Client configuration.
//!
//! Settings come from `~/.kanban/config.toml` (or `--config`), then the
//! `KB_*` environment variables, then command-line flags, each layer
//! overriding the previous one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fields::Role;

pub const ENV_API_URL: &str = "KB_API_URL";
pub const ENV_TOKEN: &str = "KB_TOKEN";
pub const ENV_PROJECT: &str = "KB_PROJECT";
pub const ENV_USER: &str = "KB_USER";

/// Raw contents of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub project: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<Role>,
    pub data_dir: Option<PathBuf>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub project: Option<String>,
    pub role: Option<Role>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: String,
    pub project: String,
    /// Used to look up the caller's role among the project members.
    pub user_id: Option<String>,
    /// Forces a role instead of looking it up.
    pub role: Option<Role>,
    /// Directory for the local layout files and the log.
    pub data_dir: PathBuf,
}

impl Config {
    /// Default home of the config file, layouts and logs.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kanban")
    }

    /// Load the config file (if present) and layer env and flags on top.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
        let default_path = Self::default_dir().join("config.toml");
        let path = path.unwrap_or(&default_path);
        let file = read_file_config(path)?;
        resolve(file, |key| std::env::var(key).ok(), overrides)
    }
}

/// Read a config file. A missing file is an empty config.
pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge file values, environment and flags into a `Config`.
pub fn resolve(
    file: FileConfig,
    env: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<Config, ConfigError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let api_url = non_empty(env(ENV_API_URL))
        .or(file.api_url)
        .ok_or(ConfigError::Missing { key: "api_url", env: ENV_API_URL })?;
    let token = non_empty(env(ENV_TOKEN))
        .or(file.token)
        .ok_or(ConfigError::Missing { key: "token", env: ENV_TOKEN })?;
    let project = overrides
        .project
        .clone()
        .or_else(|| non_empty(env(ENV_PROJECT)))
        .or(file.project)
        .ok_or(ConfigError::Missing { key: "project", env: ENV_PROJECT })?;

    Ok(Config {
        api_url,
        token,
        project,
        user_id: non_empty(env(ENV_USER)).or(file.user_id),
        role: overrides.role.or(file.role),
        data_dir: file.data_dir.unwrap_or_else(Config::default_dir),
    })
}
