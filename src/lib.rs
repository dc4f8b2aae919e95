//! # item-rag
//!
//! A small HTTP API for product-like items, with one endpoint that answers a
//! query from the stored items using retrieval-augmented generation and
//! returns the answer as a `.docx` report.
//!
//! ## Architecture
//!
//! ```text
//!  GET /generate_docx_from_query/?word=...
//!        │
//!        ▼
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │  ItemStore  │──▶│ BM25 index  │──▶│  Prompt  │──▶│ Generator  │──▶│  .docx   │
//! │ (substring) │   │ (per query) │   │ template │   │ (HTTP LLM) │   │  report  │
//! └─────────────┘   └─────────────┘   └──────────┘   └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! item-rag init                 # create database
//! item-rag serve                # start HTTP server
//! item-rag ask widget           # answer a query into Model_Response.docx
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite item store |
//! | [`generation`] | Model-server client |
//! | [`report`] | `.docx` rendering |
//! | [`pipeline`] | Query-to-report orchestration |
//! | [`server`] | HTTP API |
//! | [`ask`] | `ask` CLI command |
//!
//! Models, the store trait, the BM25 index, and the prompt template live in
//! the `item-rag-core` crate.

pub mod ask;
pub mod config;
pub mod db;
pub mod generation;
pub mod migrate;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod sqlite_store;
