//! # repo-curator
//!
//! A collector that sweeps the GitHub search API for AI-related repositories,
//! scores each candidate, and decides per repository whether a new
//! observation is worth storing.
//!
//! ## Architecture
//!
//! One run is a linear pipeline:
//!
//! ```text
//!        ┌──────────────────────────────┐
//!        │  Search plan                 │
//!        │  groups × windows × sorts    │
//!        └──────────────┬───────────────┘
//!                       │ sequential queries, min delay
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  SearchOrchestrator          │
//!        │  identity-keyed pool         │
//!        │  fallback ladder, broad pass │
//!        └──────────────┬───────────────┘
//!                       │ unique candidates
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  Enrichment (≤ N in flight)  │
//!        │  real watcher counts         │
//!        └──────────────┬───────────────┘
//!                       │
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  ScoringEngine               │
//!        │  quality / trending /        │
//!        │  relevance / category / tags │
//!        └──────────────┬───────────────┘
//!                       │ relevance + quality floors
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  DeduplicationEngine         │
//!        │  Unseen → Insert             │
//!        │  Recent → Update | Skip      │
//!        │  Stale  → Reinsert | Skip    │
//!        └──────────────┬───────────────┘
//!                       │
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │  RecordStore   →  RunSummary │
//!        │                →  Sink       │
//!        └──────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration and startup validation
//! - [`models`] - Shared data types: summaries, records, fingerprints, run summary
//! - [`error`] - Typed errors for the source, store, sink and configuration boundaries
//! - [`retry`] - The retrying-call wrapper used around every external call
//! - [`scoring`] - Pure quality, trending and relevance scores plus classification
//! - [`dedup`] - The insert/update/re-entry decision function
//! - [`search`] - Query plans and the sweep orchestrator
//! - [`source`] - The candidate source trait and its GitHub implementation
//! - [`enrich`] - Semaphore-bounded watcher enrichment
//! - [`store`] - In-memory and JSON-file record stores
//! - [`notify`] - Tracing and webhook notification sinks
//! - [`pipeline`] - One end-to-end collection run
//! - [`state`] - Wiring of the shared HTTP client, source, store and sink

pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod scoring;
pub mod search;
pub mod source;
pub mod state;
pub mod store;
