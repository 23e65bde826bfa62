//! Storage abstractions for the catalog, tracking registry and dispatch ledger.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── catalog.json     # Movies, theatres, showtimes
//! ├── criteria.json    # Tracking criteria (soft-deleted ones included)
//! └── dispatch.json    # Last successful send per criterion
//! ```

pub mod documents;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    CatalogQuery, CatalogRecord, CriterionDraft, CriterionId, DispatchRecord, ShowtimeRow,
    TrackingCriterion, UpsertSummary,
};

// Re-export for convenience
pub use documents::{CatalogDocument, CriteriaDocument, LedgerDocument};
pub use local::LocalStorage;

/// Record counts held by a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub movies: usize,
    pub theatres: usize,
    pub showtimes: usize,
}

/// Persisted set of movies, theatres and showtimes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert records whose identity is not yet present; existing ones are no-ops.
    async fn upsert(&self, records: &[CatalogRecord]) -> Result<UpsertSummary>;

    /// Joined showtime rows for a city, filtered by title/theatre substrings.
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ShowtimeRow>>;

    /// Answer several queries against one consistent view of the catalog.
    async fn query_many(&self, queries: &[CatalogQuery]) -> Result<Vec<Vec<ShowtimeRow>>> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.query(query).await?);
        }
        Ok(results)
    }

    async fn counts(&self) -> Result<CatalogCounts>;
}

/// Persisted set of tracking criteria.
#[async_trait]
pub trait TrackingRegistry: Send + Sync {
    /// Create or update a criterion (see [`CriteriaDocument::save`]).
    async fn save_criterion(&self, draft: CriterionDraft) -> Result<TrackingCriterion>;

    async fn criterion(&self, id: CriterionId) -> Result<Option<TrackingCriterion>>;

    /// Set the active flag, returning `None` for an unknown id.
    async fn set_active(&self, id: CriterionId, active: bool)
    -> Result<Option<TrackingCriterion>>;

    async fn list_criteria(&self) -> Result<Vec<TrackingCriterion>>;

    async fn active_criteria(&self) -> Result<Vec<TrackingCriterion>> {
        Ok(self
            .list_criteria()
            .await?
            .into_iter()
            .filter(|c| c.active)
            .collect())
    }
}

/// Record of successful sends, one entry per criterion.
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    async fn last_dispatch(&self, id: CriterionId) -> Result<Option<DispatchRecord>>;

    /// Commit a successful send.
    async fn record_dispatch(&self, record: DispatchRecord) -> Result<()>;
}
