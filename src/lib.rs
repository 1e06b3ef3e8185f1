//! # ForestMind
//!
//! An incremental code-context indexing and retrieval engine for chat
//! assistants.
//!
//! ForestMind watches the folders attached to a chat session, keeps a
//! SQLite store of overlapping chunk windows (with embeddings) and
//! tree-sitter symbols in sync with every edit, and answers retrieval
//! queries (cosine top-K over chunks, keyword lookup over symbols) that
//! ground the assistant's responses in the user's actual code.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Watcher  │──▶│  Reconcile    │──▶│  SQLite    │
//! │ notify   │   │ Chunk+Symbol │   │ 3 tables  │
//! └──────────┘   └──────────────┘   └────┬──────┘
//!                                        │
//!                     ┌──────────────────┤
//!                     ▼                  ▼
//!                ┌──────────┐      ┌──────────┐
//!                │   CLI    │      │   HTTP   │
//!                │ (fmind)  │      │  (axum)  │
//!                └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fmind init                          # create database
//! fmind index ./src --session dev     # one-shot index of a folder
//! fmind search "retry backoff" --session dev
//! fmind symbols deleteUser
//! fmind serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Line-window chunking and fingerprints |
//! | [`symbols`] | Tree-sitter symbol extraction |
//! | [`embedding`] | Embedding providers and vector math |
//! | [`reconcile`] | Diff planning between fresh and stored state |
//! | [`indexer`] | Applies reconcile plans to the store |
//! | [`watcher`] | Watch session lifecycle and debounce |
//! | [`session`] | Folder attachment records |
//! | [`search`] | Semantic and structural retrieval |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Indexing error classification |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod search;
pub mod server;
pub mod session;
pub mod symbols;
pub mod watcher;
