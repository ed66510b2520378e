//! Download packaging for the CLI (`okr download`).
//!
//! Writes the `okrs.zip` / `okrs.csv` payload produced by
//! [`OkrEngine::download`] to a file, or streams it to stdout for piping.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::engine::OkrEngine;
use crate::search::{check_query, CliFilters};

/// Package the files matching `query`.
///
/// If `output` is `Some`, writes to that file path (a directory gets the
/// default file name appended). Otherwise writes the raw bytes to stdout.
pub async fn run_download(
    config: &Config,
    query: &str,
    k: Option<usize>,
    format: &str,
    filters: &CliFilters,
    output: Option<&Path>,
) -> Result<()> {
    check_query(query)?;
    let engine = OkrEngine::from_config(config)?;
    let k = k.unwrap_or(config.retrieval.download_k);

    let payload = engine
        .download(
            query,
            k,
            format,
            filters.team.as_deref(),
            filters.quarter.as_deref(),
        )
        .await?;

    match output {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(payload.filename)
            } else {
                path.to_path_buf()
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &payload.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", payload.bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&payload.bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
