//! Dispatch ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CriterionId;

/// Provider-assigned identifier of a delivered message.
pub type DeliveryId = String;

/// Last successful send for a criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRecord {
    pub criterion_id: CriterionId,

    /// Fingerprint of the payload that was sent
    pub fingerprint: String,

    /// Number of distinct matches in the sent payload
    pub match_count: usize,

    pub last_sent_at: DateTime<Utc>,

    pub delivery_id: DeliveryId,

    /// Total successful sends for this criterion
    #[serde(default)]
    pub send_count: u64,
}

impl DispatchRecord {
    /// Record for a send that follows `previous` (if any).
    pub fn next(
        previous: Option<&DispatchRecord>,
        criterion_id: CriterionId,
        fingerprint: String,
        match_count: usize,
        delivery_id: DeliveryId,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            criterion_id,
            fingerprint,
            match_count,
            last_sent_at: sent_at,
            delivery_id,
            send_count: previous.map_or(0, |p| p.send_count) + 1,
        }
    }
}

/// Idempotency policy applied before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Suppress only an exact repeat of the last sent payload
    #[default]
    ContentBased,
    /// Suppress any send within `secs` of the last one
    Cooldown { secs: u64 },
}
