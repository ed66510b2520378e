//! # OKR Harness
//!
//! Question answering over a directory of OKR Markdown files. Documents are
//! chunked and embedded into a global index plus one partition per team
//! and per quarter; queries are routed to the most selective partition,
//! and answers are assembled from the objective, key-result and risk lines
//! of the retrieved passages. No generative model is involved.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`loader`] | Filesystem Markdown loader with YAML front matter |
//! | [`embedding`] | Embedding backends (fastembed, hash, OpenAI, Ollama) |
//! | [`engine`] | Index lifecycle plus search / ask / download |
//! | [`search`] | CLI runners for the query commands |
//! | [`export`] | CLI download packaging |
//! | [`server`] | Axum HTTP API |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! The runtime-agnostic algorithms (chunking, partitioned indexes, filter
//! resolution, routing, extraction and ranking) live in the
//! `okr-harness-core` crate.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod export;
pub mod loader;
pub mod logging;
pub mod search;
pub mod server;
