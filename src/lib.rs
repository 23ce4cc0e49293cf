//! # summarist
//!
//! Fetches market news articles and summarizes them with a supervised pool
//! of worker processes.
//!
//! ## Architecture
//!
//! ```text
//! query → Pipeline (HTTP tier → browser tier) → JobQueue → link driver → worker
//!                                                   ↑                      │
//!                                                   └──── ResultStore ←────┘
//! ```
//!
//! - [`pipeline`]: two-tier acquisition of a search result and its article
//! - [`queue`]: pending jobs and the in-flight dedup set
//! - [`pool`]: local worker processes, restarted at the same index on death
//! - [`remote`]: detached workers connecting over TCP
//! - [`store`]: one persisted artifact per job id
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch the top article for a query
//! summarist fetch "Samsung Electronics"
//!
//! # Summarize several queries with four local workers
//! summarist run --workers 4 Samsung Nvidia Tesla
//!
//! # Attach a worker from another machine
//! summarist worker --connect 10.0.0.5:6666
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// queue, acquisition pipeline and worker pool.
pub mod app;

/// Command-line interface using clap.
///
/// - `fetch <query>` - Print the acquired article
/// - `run <query>...` - Acquire, summarize and print
/// - `result <id>` / `list` - Read persisted summaries
/// - `worker` - Serve as a worker process
pub mod cli;

/// Configuration loaded from `~/.config/summarist/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`ArticleRecord`](domain::ArticleRecord): acquired article
/// - [`JobId`](domain::JobId): safe, deterministic job identity
/// - [`SummaryArtifact`](domain::SummaryArtifact): persisted result
pub mod domain;

/// Plain HTTP fetch tier and HTML extraction.
pub mod fetcher;

/// Headless Chrome fallback tier via chromiumoxide.
pub mod renderer;

pub mod pipeline;

pub mod queue;

/// Length-prefixed JSON frames spoken between dispatcher and workers.
pub mod protocol;

/// Worker-side loop and the summarizer capability.
pub mod worker;

/// Worker supervisor and link driver.
pub mod pool;

pub mod remote;

/// Persisted result store.
///
/// - [`ResultStore`](store::ResultStore): Trait defining storage operations
/// - [`FsResultStore`](store::FsResultStore): JSON files in a directory
pub mod store;
