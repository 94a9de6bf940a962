//! # PDF Links
//!
//! Recovers every hyperlink in a PDF and makes the selected ones robust by
//! pairing each with an archived snapshot.
//!
//! Links come from two unreliable sources: link annotations and the page
//! text layer. Both are canonicalized, merged, and deduplicated by overlap
//! into one sorted list. A caller-chosen subset is then sent to the Robust
//! Links archive with bounded concurrency; outcomes stream back in
//! completion order and the resulting mapping is persisted per document.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!   PDF bytes ─┤ annotations  ├─┐
//!              └──────────────┘ │  ┌───────────┐  ┌─────────┐
//!                               ├─▶│ canonical │─▶│ overlap │─▶ links
//!              ┌──────────────┐ │  └───────────┘  └─────────┘
//!              │ text_links   ├─┘                      │
//!              └──────────────┘                        ▼
//!                                   ┌───────────┐  ┌─────────┐
//!                    NDJSON lines ◀─│ robustify │◀─│ archive │
//!                                   └─────┬─────┘  └─────────┘
//!                                         ▼
//!                                   ┌───────────┐
//!                                   │   store   │
//!                                   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`blacklist`] | Compiled URL blacklist |
//! | [`canonical`] | URL canonicalization and public-URL check |
//! | [`overlap`] | Overlap-based deduplication |
//! | [`annotations`] | Link annotation reader |
//! | [`text_links`] | Text layer link reader |
//! | [`extract`] | Extraction orchestrator |
//! | [`models`] | Document identity and robust mapping types |
//! | [`archive`] | Robust Links API client |
//! | [`robustify`] | Streaming, cancellable robustify pipeline |
//! | [`store`] | Document and mapping persistence |
//! | [`config`] | TOML configuration parsing |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI entry points |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod annotations;
pub mod archive;
pub mod blacklist;
pub mod canonical;
pub mod commands;
pub mod config;
pub mod db;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod overlap;
pub mod robustify;
pub mod server;
pub mod store;
pub mod text_links;
