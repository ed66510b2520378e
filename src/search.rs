//! CLI runners for the query commands (`okr build`, `okr search`,
//! `okr ask`, `okr teams`, `okr quarters`).
//!
//! Each runner builds an [`OkrEngine`] from the configuration, performs one
//! operation and prints a human-readable result to stdout.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::engine::OkrEngine;
use crate::server::MIN_QUERY_CHARS;

/// Optional team/quarter filters passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliFilters {
    pub team: Option<String>,
    pub quarter: Option<String>,
}

pub(crate) fn check_query(query: &str) -> Result<()> {
    if query.chars().count() < MIN_QUERY_CHARS {
        bail!("query must be at least {} characters", MIN_QUERY_CHARS);
    }
    Ok(())
}

pub async fn run_build(config: &Config) -> Result<()> {
    let engine = OkrEngine::from_config(config)?;
    let result = engine.build_index().await?;

    println!(
        "Indexed {} documents ({} chunks) from {}",
        result.document_count,
        result.chunk_count,
        config.corpus.dir.display()
    );
    println!("  teams: {}", list_or_none(&result.teams));
    println!("  quarters: {}", list_or_none(&result.quarters));
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    k: Option<usize>,
    filters: &CliFilters,
) -> Result<()> {
    check_query(query)?;
    let engine = OkrEngine::from_config(config)?;
    let k = k.unwrap_or(config.retrieval.search_k);

    let hits = engine
        .search(query, k, filters.team.as_deref(), filters.quarter.as_deref())
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {}", i + 1, hit.path);
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        println!();
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    query: &str,
    k: Option<usize>,
    filters: &CliFilters,
) -> Result<()> {
    check_query(query)?;
    let engine = OkrEngine::from_config(config)?;
    let k = k.unwrap_or(config.retrieval.ask_k);

    let answer = engine
        .ask(query, k, filters.team.as_deref(), filters.quarter.as_deref())
        .await?;

    if let Some(team) = &answer.team {
        println!("team: {}", team);
    }
    if let Some(quarter) = &answer.quarter {
        println!("quarter: {}", quarter);
    }

    if answer.bullets.is_empty() {
        println!("No answer found.");
    } else {
        for bullet in &answer.bullets {
            println!("- {}", bullet);
        }
    }

    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        for (i, citation) in answer.citations.iter().enumerate() {
            println!("  [{}] {}", i + 1, citation.path);
        }
    }
    Ok(())
}

pub async fn run_teams(config: &Config, quarter: Option<&str>) -> Result<()> {
    let engine = OkrEngine::from_config(config)?;
    for team in engine.teams(quarter).await? {
        println!("{}", team);
    }
    Ok(())
}

pub async fn run_quarters(config: &Config, team: Option<&str>) -> Result<()> {
    let engine = OkrEngine::from_config(config)?;
    for quarter in engine.quarters(team).await? {
        println!("{}", quarter);
    }
    Ok(())
}

fn list_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}
