//! Matching and dispatch pipeline.
//!
//! - `ingest`: Load scraped showtimes into the catalog
//! - `feed`: Register criteria from the static alert feed
//! - `filter` → `reduce` → `fingerprint` → `dispatch`: per-criterion stages
//! - `engine`: Run every stage for all active criteria

pub mod dispatch;
pub mod engine;
pub mod feed;
pub mod filter;
pub mod fingerprint;
pub mod ingest;
pub mod reduce;

pub use engine::{AlertEngine, CriterionOutcome, EngineOptions, RunReport};
pub use feed::{FeedImport, import_alert_feed};
pub use ingest::{IngestSummary, ingest_file, load_submission, submit_showtimes};
