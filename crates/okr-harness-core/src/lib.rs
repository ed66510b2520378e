//! # OKR Harness Core
//!
//! Runtime-agnostic logic for OKR Harness: data models, chunking,
//! partitioned vector indexes, filter resolution, retrieval routing, and
//! extractive answer ranking.
//!
//! This crate does no filesystem or network I/O. Documents arrive through
//! the [`source::DocumentSource`] trait and vectors through the
//! [`embedding::EmbeddingProvider`] trait; the `okr-harness` app crate
//! supplies the concrete implementations.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod models;
pub mod rank;
pub mod router;
pub mod source;
