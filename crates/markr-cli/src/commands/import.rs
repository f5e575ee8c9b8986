//! The `markr import` command.

use std::path::PathBuf;

use anyhow::Result;

use super::{open_engine, read_batch};

pub async fn execute(file: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let xml = read_batch(&file)?;
    let engine = open_engine(config_path)?;

    let summary = engine.ingest_detailed(&xml).await?;
    if summary.distinct < summary.entries {
        eprintln!(
            "  {} duplicate scan(s) collapsed, {} unchanged",
            summary.entries - summary.distinct,
            summary.unchanged
        );
    }
    println!("Successfully processed {} results", summary.affected());

    Ok(())
}
