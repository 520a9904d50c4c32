//! Collection and ledger overview.
//!
//! `docvec stats` prints the point count of the collection next to the
//! number of files the ledger knows about, as a quick check that ingests
//! are landing where expected.

use anyhow::Result;

use crate::config::Config;
use crate::qdrant;
use crate::tracker::FileLedger;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let repository = qdrant::open_repository(config)?;
    let points = repository.count().await?;
    let ledger = FileLedger::open(&config.ingest.ledger_path);

    println!("docvec stats");
    println!("============");
    println!();
    println!("  Qdrant:      {}", config.qdrant.url);
    println!("  Collection:  {}", config.qdrant.collection);
    println!("  Dimensions:  {}", repository.dims());
    println!("  Chunks:      {}", points);
    println!();
    println!("  Ledger:      {}", ledger.path().display());
    println!("  Files:       {}", ledger.len());
    Ok(())
}
