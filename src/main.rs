//! # OKR Harness CLI (`okr`)
//!
//! The `okr` binary indexes a directory of OKR Markdown files and answers
//! questions about them, either one-shot from the command line or as an
//! HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! okr [--config ./okr.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `okr build` | Load, chunk and embed the corpus; print a summary |
//! | `okr search "<query>"` | Print the best-matching passages |
//! | `okr ask "<question>"` | Print an extractive answer with sources |
//! | `okr download "<query>"` | Package matching files as zip or csv |
//! | `okr teams` | List known teams |
//! | `okr quarters` | List known quarters |
//! | `okr serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ask about one team's objectives
//! OKR_DIR=./okrs okr ask "objectives for Platform"
//!
//! # Key results for a quarter, restricted explicitly
//! okr ask "key results" --quarter 2025-Q3
//!
//! # Export matching passages as CSV
//! okr download "reliability" --format csv --output okrs.csv
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use okr_harness::search::CliFilters;
use okr_harness::{config, export, logging, search, server};

/// OKR Harness CLI: extractive question answering over OKR Markdown.
///
/// Configuration comes from an optional TOML file; `OKR_DIR` and
/// `EMBED_MODEL` override the corpus directory and embedding model.
#[derive(Parser)]
#[command(
    name = "okr",
    about = "OKR Harness: extractive question answering over OKR Markdown files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional. Without it, built-in defaults plus environment overrides
    /// are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Filters shared by the query commands.
#[derive(clap::Args)]
struct FilterArgs {
    /// Restrict to one team (case-insensitive).
    #[arg(long)]
    team: Option<String>,

    /// Restrict to one quarter (case-insensitive), e.g. `2025-Q3`.
    #[arg(long)]
    quarter: Option<String>,
}

impl From<FilterArgs> for CliFilters {
    fn from(args: FilterArgs) -> Self {
        CliFilters {
            team: args.team,
            quarter: args.quarter,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the index and print a summary.
    ///
    /// Loads every Markdown file under the corpus directory, chunks and
    /// embeds it, and reports the documents, chunks, teams and quarters
    /// found.
    Build,

    /// Search the corpus.
    ///
    /// Without `--team`/`--quarter`, team and quarter names mentioned in
    /// the query are used as filters.
    Search {
        /// The search query string.
        query: String,

        /// Number of passages to return (default: `retrieval.search_k`).
        #[arg(short, long)]
        k: Option<usize>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Answer a question with sentences extracted from the corpus.
    Ask {
        /// The question.
        query: String,

        /// Number of passages to draw sentences from (default: `retrieval.ask_k`).
        #[arg(short, long)]
        k: Option<usize>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Package the files or passages matching a query.
    Download {
        /// The search query string.
        query: String,

        /// Number of passages to retrieve (default: `retrieval.download_k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Output format: `zip` (matching source files) or `csv` (passages).
        #[arg(long, default_value = "zip")]
        format: String,

        /// Output file or directory. Writes to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List teams, optionally only those with OKRs in a quarter.
    Teams {
        #[arg(long)]
        quarter: Option<String>,
    },

    /// List quarters, optionally only those with OKRs from a team.
    Quarters {
        #[arg(long)]
        team: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build => {
            search::run_build(&cfg).await?;
        }
        Commands::Search { query, k, filters } => {
            search::run_search(&cfg, &query, k, &filters.into()).await?;
        }
        Commands::Ask { query, k, filters } => {
            search::run_ask(&cfg, &query, k, &filters.into()).await?;
        }
        Commands::Download {
            query,
            k,
            format,
            output,
            filters,
        } => {
            export::run_download(&cfg, &query, k, &format, &filters.into(), output.as_deref())
                .await?;
        }
        Commands::Teams { quarter } => {
            search::run_teams(&cfg, quarter.as_deref()).await?;
        }
        Commands::Quarters { team } => {
            search::run_quarters(&cfg, team.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
