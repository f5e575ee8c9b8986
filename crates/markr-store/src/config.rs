//! Store configuration and repository factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use markr_core::traits::ResultRepository;

use crate::memory::MemoryRepository;

/// Environment variable that overrides the snapshot path and forces the
/// JSON backend.
pub const STORE_PATH_ENV: &str = "MARKR_STORE_PATH";

/// Which repository implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory only; everything is lost on exit.
    Memory,
    /// In memory, snapshotted to a JSON file on every commit.
    #[default]
    Json,
}

/// The `[store]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Snapshot location for the JSON backend. `${VAR}` references are
    /// expanded on load.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./markr-data/results.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

/// Top-level markr configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkrConfig {
    #[serde(default)]
    pub store: StoreConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not expanded again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut cursor = 0;
    while let Some(offset) = result[cursor..].find("${") {
        let start = cursor + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result.replace_range(start..start + end + 1, &value);
        cursor = start + value.len();
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `markr.toml` in the current directory
/// 2. `~/.config/markr/config.toml`
///
/// `MARKR_STORE_PATH` overrides the snapshot path and selects the JSON backend.
pub fn load_config() -> Result<MarkrConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MarkrConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("markr.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_file(&path)?
        }
        None => MarkrConfig::default(),
    };

    config.store.path = PathBuf::from(resolve_env_vars(&config.store.path.to_string_lossy()));

    if let Ok(path) = std::env::var(STORE_PATH_ENV) {
        if !path.is_empty() {
            config.store.backend = StoreBackend::Json;
            config.store.path = PathBuf::from(path);
        }
    }

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<MarkrConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<MarkrConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("markr"))
}

/// Create a repository from its configuration.
pub fn create_repository(config: &StoreConfig) -> Result<Arc<dyn ResultRepository>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRepository::new())),
        StoreBackend::Json => {
            let repo = MemoryRepository::open_snapshot(&config.path).with_context(|| {
                format!("failed to open result store at {}", config.path.display())
            })?;
            Ok(Arc::new(repo))
        }
    }
}
