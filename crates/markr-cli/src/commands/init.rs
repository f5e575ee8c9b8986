//! The `markr init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("markr.toml").exists() {
        println!("markr.toml already exists, skipping.");
    } else {
        std::fs::write("markr.toml", SAMPLE_CONFIG)?;
        println!("Created markr.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: markr generate --records 50 --output batch.xml");
    println!("  2. Run: markr import --file batch.xml");
    println!("  3. Run: markr aggregate --test-id <id>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# markr configuration

[store]
# "json" keeps results in a snapshot file; "memory" forgets them on exit.
backend = "json"
path = "./markr-data/results.json"
"#;
