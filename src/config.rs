use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::branches::DEFAULT_FALLBACK_BRANCHES;
use crate::paths::expand_tilde;

pub const CONFIG_ENV: &str = "GBULK_CONFIG";

const DEFAULT_EXCLUDE: &[&str] = &["node_modules"];
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_SUBMODULE_BRANCH: &str = "main";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pull: PullConfig,
    #[serde(default)]
    pub submodules: SubmoduleConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullConfig {
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub fallback_branches: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmoduleConfig {
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub directory: PathBuf,
    pub exclude: Vec<String>,
    pub remote: String,
    pub fallback_branches: Vec<String>,
    pub submodule_branch: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            exclude: to_strings(DEFAULT_EXCLUDE),
            remote: DEFAULT_REMOTE.to_string(),
            fallback_branches: to_strings(DEFAULT_FALLBACK_BRANCHES),
            submodule_branch: DEFAULT_SUBMODULE_BRANCH.to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn default_config_path() -> Result<PathBuf> {
    let proj = directories::ProjectDirs::from("", "", "gbulk")
        .context("could not determine config directory")?;
    Ok(proj.config_dir().join("config.toml"))
}

/// Resolves configuration from `--config`, then `GBULK_CONFIG`, then the
/// platform config directory. Only an explicitly passed file must exist.
pub fn load(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let path = match std::env::var(CONFIG_ENV) {
        Ok(value) if !value.is_empty() => expand_tilde(&value),
        _ => match default_config_path() {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "no config directory, using defaults");
                return Ok(ResolvedConfig::default());
            }
        },
    };

    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(ResolvedConfig::default());
    }
    load_config(&path)
}

pub fn load_config(path: &Path) -> Result<ResolvedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config at {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<ResolvedConfig> {
    let raw: Config = toml::from_str(contents).context("failed to parse config TOML")?;
    let defaults = ResolvedConfig::default();

    let directory = match &raw.general.directory {
        Some(dir) => expand_tilde(dir.to_str().unwrap_or("")),
        None => defaults.directory,
    };
    if directory.as_os_str().is_empty() {
        bail!("general.directory must not be empty");
    }

    let exclude = raw.general.exclude.unwrap_or(defaults.exclude);
    for entry in &exclude {
        if entry.is_empty() || entry.contains('/') || entry.contains('\\') {
            bail!(
                "general.exclude entries must be plain directory names, got {:?}",
                entry
            );
        }
    }

    let remote = raw.pull.remote.unwrap_or(defaults.remote);
    if remote.trim().is_empty() {
        bail!("pull.remote must not be empty");
    }

    let fallback_branches: Vec<String> = raw
        .pull
        .fallback_branches
        .unwrap_or(defaults.fallback_branches)
        .into_iter()
        .filter(|b| !b.trim().is_empty())
        .collect();

    let submodule_branch = raw.submodules.branch.unwrap_or(defaults.submodule_branch);
    if submodule_branch.trim().is_empty() {
        bail!("submodules.branch must not be empty");
    }

    Ok(ResolvedConfig {
        directory,
        exclude,
        remote,
        fallback_branches,
        submodule_branch,
    })
}
