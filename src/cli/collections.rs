//! CLI `collections` and `drop-collection` commands.

use anyhow::{bail, Context, Result};
use std::io::Write;

use agriqa::config::QaConfig;
use agriqa::store::VectorStoreClient;

fn open_client(config: &QaConfig) -> Result<VectorStoreClient> {
    if config.storage.db_path.trim().is_empty() {
        bail!("storage.db_path (AGRIQA_DB) is not set");
    }
    let db_path = config.resolved_db_path();
    VectorStoreClient::open(&db_path)
        .with_context(|| format!("failed to open vector store at {}", db_path.display()))
}

pub fn list(config: &QaConfig) -> Result<()> {
    let client = open_client(config)?;
    let collections = client.list_collections()?;

    if collections.is_empty() {
        println!("No collections.");
        return Ok(());
    }

    println!(
        "{:<24} {:<8} {:>6} {:>8}  {:<20} {}",
        "Name", "Metric", "Dims", "Entries", "Model", "Created"
    );
    println!("{}", "-".repeat(90));
    for c in &collections {
        println!(
            "{:<24} {:<8} {:>6} {:>8}  {:<20} {}",
            c.name,
            c.metric,
            c.dimensions.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            c.count,
            c.model.as_deref().unwrap_or("-"),
            c.created_at,
        );
    }
    Ok(())
}

/// Delete a collection after confirmation unless `yes` is set.
pub fn drop(config: &QaConfig, name: &str, yes: bool) -> Result<()> {
    let client = open_client(config)?;
    let count = client.get_collection(name)?.count()?;

    if !yes {
        println!("WARNING: This will permanently delete collection '{name}' ({count} entries).");
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if input.trim() != "YES" {
            bail!("drop cancelled");
        }
    }

    client.delete_collection(name)?;
    println!("Collection '{name}' deleted.");
    Ok(())
}
