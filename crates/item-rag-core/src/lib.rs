//! # item-rag core
//!
//! Runtime-agnostic logic for item-rag: item models, the [`store::ItemStore`]
//! abstraction with an in-memory backend, the per-request BM25 retrieval
//! index, and the prompt template used for generation.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! The application crate supplies the SQLite store, the generation client,
//! and the HTTP surface.

pub mod index;
pub mod models;
pub mod prompt;
pub mod store;
