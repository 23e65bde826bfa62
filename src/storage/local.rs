//! Local filesystem storage implementation.
//!
//! Every document is rewritten atomically (write to temp, then rename), and
//! each read-modify-write cycle runs under the document's own lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    CatalogQuery, CatalogRecord, CriterionDraft, CriterionId, DispatchRecord, ShowtimeRow,
    TrackingCriterion, UpsertSummary,
};
use crate::storage::{
    CatalogCounts, CatalogDocument, CatalogStore, CriteriaDocument, DispatchLedger,
    LedgerDocument, TrackingRegistry,
};

const CATALOG_KEY: &str = "catalog.json";
const CRITERIA_KEY: &str = "criteria.json";
const LEDGER_KEY: &str = "dispatch.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    catalog_lock: Arc<Mutex<()>>,
    criteria_lock: Arc<Mutex<()>>,
    ledger_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            catalog_lock: Arc::new(Mutex::new(())),
            criteria_lock: Arc::new(Mutex::new(())),
            ledger_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        let storage_err = |e: std::io::Error| AppError::storage(key, e);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await.map_err(storage_err)?;
        file.write_all(bytes).await.map_err(storage_err)?;
        file.flush().await.map_err(storage_err)?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await.map_err(storage_err)?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| AppError::storage(key, e))?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::storage(key, e)),
        }
    }

    /// Read a JSON document, defaulting when absent.
    async fn read_document<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| AppError::storage(key, e)),
            None => Ok(T::default()),
        }
    }

    async fn read_catalog(&self) -> Result<CatalogDocument> {
        self.read_document(CATALOG_KEY).await
    }

    async fn read_criteria(&self) -> Result<CriteriaDocument> {
        self.read_document(CRITERIA_KEY).await
    }

    async fn read_ledger(&self) -> Result<LedgerDocument> {
        self.read_document(LEDGER_KEY).await
    }
}

#[async_trait]
impl CatalogStore for LocalStorage {
    async fn upsert(&self, records: &[CatalogRecord]) -> Result<UpsertSummary> {
        let _guard = self.catalog_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        let summary = catalog.apply(records)?;

        if summary.added() > 0 {
            self.write_json(CATALOG_KEY, &catalog).await?;
            log::debug!(
                "Catalog: +{} movies, +{} theatres, +{} showtimes",
                summary.movies_added,
                summary.theatres_added,
                summary.showtimes_added
            );
        }
        Ok(summary)
    }

    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ShowtimeRow>> {
        let _guard = self.catalog_lock.lock().await;
        Ok(self.read_catalog().await?.query(query))
    }

    async fn query_many(&self, queries: &[CatalogQuery]) -> Result<Vec<Vec<ShowtimeRow>>> {
        let _guard = self.catalog_lock.lock().await;
        Ok(self.read_catalog().await?.query_many(queries))
    }

    async fn counts(&self) -> Result<CatalogCounts> {
        let _guard = self.catalog_lock.lock().await;
        let catalog = self.read_catalog().await?;
        Ok(CatalogCounts {
            movies: catalog.movies.len(),
            theatres: catalog.theatres.len(),
            showtimes: catalog.showtimes.len(),
        })
    }
}

#[async_trait]
impl TrackingRegistry for LocalStorage {
    async fn save_criterion(&self, draft: CriterionDraft) -> Result<TrackingCriterion> {
        let _guard = self.criteria_lock.lock().await;
        let mut criteria = self.read_criteria().await?;
        let saved = criteria.save(draft, Utc::now())?;
        self.write_json(CRITERIA_KEY, &criteria).await?;
        Ok(saved)
    }

    async fn criterion(&self, id: CriterionId) -> Result<Option<TrackingCriterion>> {
        let _guard = self.criteria_lock.lock().await;
        Ok(self.read_criteria().await?.get(id).cloned())
    }

    async fn set_active(
        &self,
        id: CriterionId,
        active: bool,
    ) -> Result<Option<TrackingCriterion>> {
        let _guard = self.criteria_lock.lock().await;
        let mut criteria = self.read_criteria().await?;
        let updated = criteria.set_active(id, active, Utc::now());
        if updated.is_some() {
            self.write_json(CRITERIA_KEY, &criteria).await?;
        }
        Ok(updated)
    }

    async fn list_criteria(&self) -> Result<Vec<TrackingCriterion>> {
        let _guard = self.criteria_lock.lock().await;
        Ok(self.read_criteria().await?.criteria)
    }
}

#[async_trait]
impl DispatchLedger for LocalStorage {
    async fn last_dispatch(&self, id: CriterionId) -> Result<Option<DispatchRecord>> {
        let _guard = self.ledger_lock.lock().await;
        Ok(self.read_ledger().await?.get(id).cloned())
    }

    async fn record_dispatch(&self, record: DispatchRecord) -> Result<()> {
        let _guard = self.ledger_lock.lock().await;
        let mut ledger = self.read_ledger().await?;
        ledger.put(record);
        self.write_json(LEDGER_KEY, &ledger).await
    }
}
