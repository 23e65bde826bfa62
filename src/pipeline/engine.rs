// src/pipeline/engine.rs

//! Alert engine: one matching and dispatch pass over every active criterion.
//!
//! The catalog is read once per pass. Per criterion the pass is
//! filter → reduce → fingerprint → ledger check → send → ledger commit. Criteria are independent, so they
//! run concurrently up to `max_concurrent`. The ledger entry is written
//! only after the transport reports success.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    CatalogQuery, Config, CriterionId, DeliveryId, DispatchPolicy, DispatchRecord, ShowtimeRow,
    TrackingCriterion,
};
use crate::pipeline::dispatch::{Decision, decide};
use crate::pipeline::filter;
use crate::pipeline::fingerprint;
use crate::pipeline::reduce::{ReduceOptions, Reduction, reduce};
use crate::services::Notifier;
use crate::storage::{CatalogStore, DispatchLedger, TrackingRegistry};

/// Engine settings, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub reduce: ReduceOptions,
    pub policy: DispatchPolicy,
    pub max_concurrent: usize,
    /// Used for criteria without a destination of their own
    pub default_destination: Option<String>,
    /// Evaluate and log messages without sending or recording them
    pub dry_run: bool,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reduce: ReduceOptions {
                max_lines_per_movie: config.engine.max_lines_per_movie,
                merge_title_variants: config.engine.merge_title_variants,
            },
            policy: config.dispatch.policy(),
            max_concurrent: config.engine.max_concurrent,
            default_destination: config.notifier.default_destination.clone(),
            dry_run: false,
        }
    }

    /// Like [`EngineOptions::from_config`], but rejects a config that fails validation.
    pub fn validated(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to one criterion during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionOutcome {
    NoMatch,
    Sent {
        delivery_id: DeliveryId,
        match_count: usize,
    },
    Suppressed(Decision),
    /// Dry run: the message that would have been sent
    Previewed { body: String },
    /// Configuration problem; the criterion was not attempted
    Skipped { reason: String },
    /// Transport failure; eligible for resend next run
    Failed { reason: String },
}

/// Summary of one engine run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub checked: usize,
    pub matched: usize,
    pub no_match: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Per-criterion outcomes, ordered by criterion id
    pub outcomes: Vec<(CriterionId, CriterionOutcome)>,
}

impl RunReport {
    fn record(&mut self, id: CriterionId, outcome: CriterionOutcome) {
        self.checked += 1;
        match &outcome {
            CriterionOutcome::NoMatch => self.no_match += 1,
            CriterionOutcome::Sent { .. } => {
                self.matched += 1;
                self.sent += 1;
            }
            CriterionOutcome::Suppressed(_) => {
                self.matched += 1;
                self.suppressed += 1;
            }
            CriterionOutcome::Previewed { .. } => self.matched += 1,
            CriterionOutcome::Skipped { .. } => {
                self.matched += 1;
                self.skipped += 1;
            }
            CriterionOutcome::Failed { .. } => {
                self.matched += 1;
                self.failed += 1;
            }
        }
        self.outcomes.push((id, outcome));
    }

    pub fn outcome(&self, id: CriterionId) -> Option<&CriterionOutcome> {
        self.outcomes.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }
}

/// Matching and dispatch engine.
pub struct AlertEngine {
    catalog: Arc<dyn CatalogStore>,
    registry: Arc<dyn TrackingRegistry>,
    ledger: Arc<dyn DispatchLedger>,
    notifier: Option<Arc<dyn Notifier>>,
    options: EngineOptions,
}

impl AlertEngine {
    /// Create an engine. Without a notifier every would-be send is skipped
    /// as a configuration error (dry runs are unaffected).
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        registry: Arc<dyn TrackingRegistry>,
        ledger: Arc<dyn DispatchLedger>,
        notifier: Option<Arc<dyn Notifier>>,
        options: EngineOptions,
    ) -> Self {
        Self {
            catalog,
            registry,
            ledger,
            notifier,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run one pass now.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Run one pass with an explicit clock (cooldowns and ledger timestamps use `now`).
    ///
    /// A storage error aborts the pass. Criteria already committed stay committed.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let criteria = self.registry.active_criteria().await?;
        log::info!("Checking {} active criteria", criteria.len());

        let queries: Vec<_> = criteria
            .iter()
            .map(|c| CatalogQuery {
                city: c.city.clone(),
                title_pattern: c.title_pattern.clone(),
                theatre_pattern: c.theatre_pattern.clone(),
            })
            .collect();
        let rows = self.catalog.query_many(&queries).await?;

        let concurrency = self.options.max_concurrent.max(1);
        let mut results = stream::iter(criteria.into_iter().zip(rows))
            .map(|(criterion, rows)| async move {
                let outcome = self.process(&criterion, rows, now).await;
                (criterion.id, outcome)
            })
            .buffer_unordered(concurrency);

        let mut outcomes = Vec::new();
        while let Some((id, outcome)) = results.next().await {
            match outcome {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(e) => {
                    log::error!("Run aborted at criterion #{}: {}", id, e);
                    return Err(e);
                }
            }
        }

        outcomes.sort_by_key(|(id, _)| *id);
        let mut report = RunReport::default();
        for (id, outcome) in outcomes {
            report.record(id, outcome);
        }
        Ok(report)
    }

    async fn process(
        &self,
        criterion: &TrackingCriterion,
        rows: Vec<ShowtimeRow>,
        now: DateTime<Utc>,
    ) -> Result<CriterionOutcome> {
        let id = criterion.id;
        let passing: Vec<_> = rows
            .into_iter()
            .filter(|row| filter::matches(criterion, row))
            .collect();

        let notification = match reduce(criterion, &passing, &self.options.reduce) {
            Reduction::NoMatch => {
                log::debug!("Criterion #{}: no match", id);
                return Ok(CriterionOutcome::NoMatch);
            }
            Reduction::Matched(notification) => notification,
        };

        let destination = criterion
            .destination
            .as_deref()
            .or(self.options.default_destination.as_deref());
        let print = fingerprint::addressed(&notification.match_keys, destination);
        let body = notification.render(self.options.reduce.max_lines_per_movie);
        let last = self.ledger.last_dispatch(id).await?;

        let decision = decide(self.options.policy, last.as_ref(), &print, now);
        if !decision.should_send() {
            log::info!("Criterion #{}: suppressed ({:?})", id, decision);
            return Ok(CriterionOutcome::Suppressed(decision));
        }

        if self.options.dry_run {
            log::info!("Criterion #{} (dry run) would send:\n{}", id, body);
            return Ok(CriterionOutcome::Previewed { body });
        }

        let Some(destination) = destination else {
            return Ok(skip(id, AppError::config("no destination configured")));
        };

        let Some(notifier) = &self.notifier else {
            return Ok(skip(id, AppError::config("no notifier configured")));
        };

        match notifier.send(destination, &body).await {
            Ok(delivery_id) => {
                let record = DispatchRecord::next(
                    last.as_ref(),
                    id,
                    print,
                    notification.match_count(),
                    delivery_id.clone(),
                    now,
                );
                self.ledger.record_dispatch(record).await?;
                log::info!(
                    "Criterion #{}: sent {} matches to {} ({})",
                    id,
                    notification.match_count(),
                    destination,
                    delivery_id
                );
                Ok(CriterionOutcome::Sent {
                    delivery_id,
                    match_count: notification.match_count(),
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) if e.kind() == ErrorKind::Configuration => Ok(skip(id, e)),
            Err(e) => {
                log::warn!("Criterion #{}: send failed, will retry next run: {}", id, e);
                Ok(CriterionOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn skip(id: CriterionId, error: AppError) -> CriterionOutcome {
    log::warn!("Criterion #{}: skipped: {}", id, error);
    CriterionOutcome::Skipped {
        reason: error.to_string(),
    }
}
