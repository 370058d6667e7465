//! # Resift
//!
//! A self-reconciling hybrid search index over local file trees.
//!
//! Resift chunks and embeds documents under registered folders, tracks each
//! file by content hash so re-runs only touch what changed, and keeps the
//! index consistent while files are added, edited, moved, or deleted.
//! Queries blend dense (semantic) and sparse (keyword) similarity with
//! folder-scoped filtering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  events  ┌───────────┐          ┌──────────┐
//! │ Watcher  │─────────▶│ Event Bus │          │  Worker  │
//! │ (notify) │          └───────────┘          │  (poll)  │
//! └────┬─────┘                                 └────┬─────┘
//!      │ deletions (inline)      pending folders    │
//!      ▼                                            ▼
//! ┌────────────────────────────────────────────────────────┐
//! │ Indexer    walk ▶ hash ▶ chunk ▶ embed ▶ store         │
//! └───────────────────────────┬────────────────────────────┘
//!                             ▼
//!                       ┌──────────┐        ┌──────────┐
//!                       │  SQLite  │◀───────│  Search  │
//!                       │  chunks  │ fused  │ dense+kw │
//!                       └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! resift init                          # create database
//! resift index ~/notes                 # index a folder tree
//! resift search "rollout plan"         # hybrid search
//! resift get ~/notes/plan.md --merge   # reassemble a file's chunks
//! resift watch ~/notes                 # keep the index current
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunker`] | Text chunking with overlap |
//! | [`parser`] | File-type text extraction |
//! | [`embedding`] | Dense and sparse embedding providers |
//! | [`store`] | Chunk persistence and hybrid retrieval |
//! | [`indexer`] | Folder indexing, sync, and lifecycle |
//! | [`search`] | Query-side engine and CLI |
//! | [`get`] | Chunk retrieval by file and range |
//! | [`status`] | Index status reporting |
//! | [`events`] | Broadcast event bus |
//! | [`watcher`] | Filesystem watcher with debouncing |
//! | [`worker`] | Background indexing worker |
//! | [`daemon`] | Watch-mode composition |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunker;
pub mod config;
pub mod daemon;
pub mod db;
pub mod embedding;
pub mod events;
pub mod get;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod search;
pub mod status;
pub mod store;
pub mod watcher;
pub mod worker;
