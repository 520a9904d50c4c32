//! `docvec delete`: remove a file's chunks and forget it in the ledger.
//!
//! Forgetting the ledger entry means the next `ingest` of the same file
//! processes it again instead of skipping it as unchanged.

use anyhow::Result;
use tracing::warn;

use crate::config::Config;
use crate::qdrant;
use crate::tracker::FileLedger;

/// Returns the number of chunks removed.
pub async fn run_delete(config: &Config, file_name: &str) -> Result<usize> {
    let repository = qdrant::open_repository(config)?;
    let removed = repository.delete_by_file_name(file_name).await?;

    let mut ledger = FileLedger::open(&config.ingest.ledger_path);
    let forgotten = match ledger.forget(file_name) {
        Ok(found) => found,
        Err(e) => {
            warn!(file = file_name, error = %format!("{:#}", e), "failed to update ledger");
            false
        }
    };

    if removed == 0 && !forgotten {
        println!("Nothing stored for {}.", file_name);
    } else {
        println!("delete {}", file_name);
        println!("  chunks removed: {}", removed);
        println!("  ledger entry removed: {}", if forgotten { "yes" } else { "no" });
    }
    Ok(removed)
}
