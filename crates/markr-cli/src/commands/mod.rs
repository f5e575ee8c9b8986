pub mod aggregate;
pub mod generate;
pub mod import;
pub mod init;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use markr_core::ResultsEngine;
use markr_store::{create_repository, load_config_from};

/// Build an engine over the configured store.
pub(crate) fn open_engine(config_path: Option<PathBuf>) -> Result<ResultsEngine> {
    let config = load_config_from(config_path.as_deref())?;
    tracing::debug!(
        backend = ?config.store.backend,
        path = %config.store.path.display(),
        "using result store"
    );
    Ok(ResultsEngine::new(create_repository(&config.store)?))
}

/// Read an XML batch from disk.
pub(crate) fn read_batch(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
