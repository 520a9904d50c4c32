//! `docvec get`: every stored chunk of one file, in order.

use anyhow::Result;
use docvec_core::models::Document;

use crate::config::Config;
use crate::qdrant;

pub async fn run_get(config: &Config, file_name: &str, json: bool) -> Result<Vec<Document>> {
    let repository = qdrant::open_repository(config)?;
    let documents = repository.get_by_file_name(file_name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(documents);
    }

    if documents.is_empty() {
        println!("No chunks stored for {}.", file_name);
        return Ok(documents);
    }

    let first = &documents[0];
    println!("{}", file_name);
    println!("  chunks:    {}", documents.len());
    println!("  hash:      {}", first.file_hash);
    println!(
        "  processed: {}",
        first.processed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for doc in &documents {
        println!();
        println!("--- {} ({}/{}) ---", doc.chunk_id, doc.chunk_index + 1, doc.total_chunks);
        println!("{}", doc.content);
    }
    Ok(documents)
}
