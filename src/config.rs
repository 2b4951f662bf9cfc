use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use reqwest::Url;
use serde::Deserialize;
use tracing::warn;

use crate::history;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "phonebook";
const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    /// Server root, always ending in `/`.
    pub base_url: String,
    pub data_dir: PathBuf,
    pub search: SearchConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
    pub history_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Directory the device address book writes `.vcf` files into.
    pub vdir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    data_dir: Option<PathBuf>,
    search: SearchFile,
    device: DeviceFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchFile {
    debounce_ms: u64,
    history_limit: usize,
}

impl Default for SearchFile {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            history_limit: history::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceFile {
    vdir: Option<PathBuf>,
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Append the trailing slash endpoint paths are joined under, and check the scheme.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let mut normalized = raw.trim().to_string();
    if normalized.is_empty() {
        bail!("`base_url` must not be empty");
    }
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).with_context(|| format!("invalid `base_url`: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("`base_url` must use http or https: {raw}");
    }
    Ok(normalized)
}

/// Load the configuration from `path` (or the default location), applying a
/// command-line `base_url` override when given.
pub fn load(path: Option<&Path>, base_url_override: Option<&str>) -> Result<Config> {
    let path = match path {
        Some(path) => expand_tilde(path),
        None => config_path()?,
    };
    if !path.exists() {
        bail!(
            "configuration file not found at {}. Create it with at least `base_url = \"https://...\"`.",
            path.display()
        );
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, path, base_url_override)
}

fn parse(raw: &str, path: PathBuf, base_url_override: Option<&str>) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let base_url = base_url_override
        .map(str::to_string)
        .or(cfg_file.base_url)
        .ok_or_else(|| anyhow!("`base_url` must be specified in configuration"))?;
    let base_url = normalize_base_url(&base_url)?;

    let data_dir = match cfg_file.data_dir {
        Some(dir) => expand_tilde(&dir),
        None => default_data_dir()?,
    };

    if cfg_file.search.history_limit == 0 {
        bail!("`search.history_limit` must be at least 1");
    }

    let vdir = cfg_file
        .device
        .vdir
        .map(|dir| expand_tilde(&dir))
        .unwrap_or_else(|| data_dir.join("device"));

    Ok(Config {
        config_path: path,
        base_url,
        data_dir,
        search: SearchConfig {
            debounce: Duration::from_millis(cfg_file.search.debounce_ms),
            history_limit: cfg_file.search.history_limit,
        },
        device: DeviceConfig { vdir },
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["base_url", "data_dir", "search", "device"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warn!("unknown configuration key `{}`", key);
        }
    }

    if let Some(v) = table.get("search") {
        warn_unknown_in_section(v, "search", &["debounce_ms", "history_limit"]);
    }
    if let Some(v) = table.get("device") {
        warn_unknown_in_section(v, "device", &["vdir"]);
    }
}

fn warn_unknown_in_section(value: &toml::Value, section: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            warn!("unknown {}.* entry `{}`", section, key);
        }
    }
}
