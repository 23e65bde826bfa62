// src/services/commands.rs

//! Tracking command service.
//!
//! Backs the chat-command and CLI surfaces. Only the tracking registry is
//! touched; the catalog and dispatch ledger are never read or written here.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{CriterionDraft, CriterionId, CriterionStatus, TrackingCriterion};
use crate::storage::TrackingRegistry;

/// Commands that create, inspect and retire tracking criteria.
#[derive(Clone)]
pub struct TrackingCommands {
    registry: Arc<dyn TrackingRegistry>,
}

impl TrackingCommands {
    pub fn new(registry: Arc<dyn TrackingRegistry>) -> Self {
        Self { registry }
    }

    /// Create a criterion, or update the one the draft identifies.
    pub async fn add_or_update_criterion(&self, draft: CriterionDraft) -> Result<TrackingCriterion> {
        let explicit = draft.id;
        let saved = self.registry.save_criterion(draft).await?;

        match explicit {
            Some(_) => log::info!("Updated criterion #{}: {}", saved.id, saved.describe()),
            None if saved.created_at == saved.updated_at => {
                log::info!("Tracking #{}: {}", saved.id, saved.describe())
            }
            None => log::info!("Refreshed criterion #{}: {}", saved.id, saved.describe()),
        }
        Ok(saved)
    }

    /// Current patterns of a criterion.
    pub async fn get_status(&self, id: CriterionId) -> Result<CriterionStatus> {
        self.registry
            .criterion(id)
            .await?
            .map(|c| CriterionStatus::from(&c))
            .ok_or_else(|| unknown(id))
    }

    /// Soft-delete a criterion; its history stays in the registry.
    pub async fn deactivate(&self, id: CriterionId) -> Result<TrackingCriterion> {
        let criterion = self
            .registry
            .set_active(id, false)
            .await?
            .ok_or_else(|| unknown(id))?;
        log::info!("Deactivated criterion #{}", id);
        Ok(criterion)
    }

    /// Every criterion, active or not.
    pub async fn list(&self) -> Result<Vec<TrackingCriterion>> {
        self.registry.list_criteria().await
    }
}

fn unknown(id: CriterionId) -> AppError {
    AppError::validation(format!("Unknown criterion id {id}"))
}
