//! The `markr validate` command.

use std::path::PathBuf;

use anyhow::Result;

use markr_core::parser::decode_results;
use markr_core::reconcile::reconcile;
use markr_core::IngestFailure;

use super::read_batch;

pub fn execute(file: PathBuf) -> Result<()> {
    let xml = read_batch(&file)?;

    let records = decode_results(&xml).map_err(IngestFailure::from)?;
    let entries = records.len();
    let distinct = reconcile(records).map_err(IngestFailure::from)?.len();

    println!("Entries: {entries}");
    println!("Distinct results: {distinct}");
    if distinct < entries {
        println!("{} duplicate scan(s) will be collapsed.", entries - distinct);
    }
    println!("Batch valid.");

    Ok(())
}
