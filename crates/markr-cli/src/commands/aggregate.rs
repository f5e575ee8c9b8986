//! The `markr aggregate` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use markr_core::AggregatedStatistics;

use super::open_engine;

pub async fn execute(test_id: String, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let engine = open_engine(config_path)?;

    let Some(stats) = engine.aggregate(&test_id).await? else {
        eprintln!("No results found for test ID: {test_id}");
        std::process::exit(1);
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_table(&test_id, &stats),
    }

    Ok(())
}

fn print_table(test_id: &str, stats: &AggregatedStatistics) {
    let mut table = Table::new();
    table.set_header(vec!["Statistic", "Value"]);

    let rows = [
        ("mean", stats.mean),
        ("stddev", stats.stddev),
        ("min", stats.min),
        ("max", stats.max),
        ("p25", stats.p25),
        ("p50", stats.p50),
        ("p75", stats.p75),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{value:.1}"))]);
    }
    table.add_row(vec![Cell::new("count"), Cell::new(stats.count)]);

    println!("Test {test_id}");
    println!("{table}");
}
