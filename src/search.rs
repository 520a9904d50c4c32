//! `docvec search`: filtered similarity search over the collection.
//!
//! Builds a [`SearchQuery`] from command-line flags and config defaults,
//! embeds the query text with the configured provider and prints ranked
//! chunks. Date flags accept `YYYY-MM-DD` or RFC 3339; a bare date means
//! start of day for `--after` and end of day for `--before` (UTC).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use docvec_core::models::{SearchQuery, SearchResult};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::qdrant;

/// Command-line search options.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub files: Vec<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
    pub json: bool,
}

/// Which end of the day a bare date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBound {
    Start,
    End,
}

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp into UTC.
pub fn parse_date_bound(value: &str, bound: DayBound) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))?;
    let time = match bound {
        DayBound::Start => NaiveTime::MIN,
        DayBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .context("invalid end-of-day time")?,
    };
    Ok(date.and_time(time).and_utc())
}

/// Translate CLI flags into a query, filling gaps from `[retrieval]`.
pub fn build_query(config: &Config, args: &SearchArgs) -> Result<SearchQuery> {
    let mut query = SearchQuery::text(args.query.clone())
        .limit(args.limit.unwrap_or(config.retrieval.limit));
    for file in &args.files {
        query = query.with_file_name(file.clone());
    }
    if let Some(after) = &args.after {
        query = query.processed_after(parse_date_bound(after, DayBound::Start)?);
    }
    if let Some(before) = &args.before {
        query = query.processed_before(parse_date_bound(before, DayBound::End)?);
    }
    if let (Some(after), Some(before)) = (query.processed_after, query.processed_before) {
        if after > before {
            bail!("--after must not be later than --before");
        }
    }
    if let Some(score) = args.min_score.or(config.retrieval.min_score) {
        query = query.minimum_score(score);
    }
    Ok(query)
}

pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<SearchResult> {
    let query = build_query(config, args)?;
    let provider = create_provider(&config.embedding)?;
    let repository = qdrant::open_repository(config)?.with_embedder(provider);

    let result = repository.search(&query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.success {
        print_results(&result);
    }

    if !result.success {
        bail!(
            "search failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(result)
}

fn print_results(result: &SearchResult) {
    if result.documents.is_empty() {
        println!("No results.");
        return;
    }

    for (i, doc) in result.documents.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} (chunk {}/{})",
            i + 1,
            doc.score.unwrap_or(0.0),
            doc.file_name,
            doc.chunk_index + 1,
            doc.total_chunks
        );
        println!(
            "    processed: {}",
            doc.processed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    excerpt: \"{}\"", excerpt(&doc.content, 240));
        println!("    id: {}", doc.id);
        println!();
    }
    println!(
        "{} result(s) in {} ms",
        result.total_count,
        result.elapsed.as_millis()
    );
}

/// First `max_chars` characters on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
