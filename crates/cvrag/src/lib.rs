//! # cvrag
//!
//! **Retrieval-augmented context assembly for tailored CVs and cover letters.**
//!
//! This crate is the application shell around [`cvrag_core`]: it ingests
//! job descriptions and candidate documents into SQLite, exposes them as a
//! [`cvrag_core::ChunkStore`], and drives the retriever and context builder
//! from the `cvrag` CLI.
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ txt/md/pdf/ │──▶│ clean+chunk │──▶│   SQLite     │
//! │    docx     │   │  (+ embed)  │   │ FTS5 + vecs  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ SqliteChunkStore
//!                                            ▼
//!                          Retriever ──▶ ContextBuilder ──▶ stdout
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema creation |
//! | [`extract`] | Text extraction from txt, md, PDF and DOCX |
//! | [`embedding`] | OpenAI, Ollama and fastembed embedders |
//! | [`sqlite_store`] | SQLite [`cvrag_core::ChunkStore`] implementation |
//! | [`ingest`] | `cvrag ingest` pipeline |
//! | [`commands`] | `retrieve`, `context` and `summarize` commands |
//! | [`stats`] | Per-source document, chunk and embedding counts |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;

pub use sqlite_store::SqliteChunkStore;
