// src/models/mod.rs

//! Domain models for the alert engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod criterion;
mod dispatch;
mod feed;

// Re-export all public types
pub use catalog::{
    CatalogQuery, CatalogRecord, Movie, MovieKey, Showtime, ShowtimeRow, Theatre, TheatreKey,
    UpsertSummary, slugify,
};
pub use config::{
    Config, DispatchConfig, EngineConfig, NotifierConfig, PolicyKind, StorageConfig,
};
pub use criterion::{
    CriterionDraft, CriterionId, CriterionStatus, Filter, TIME_PREFIX, TimeWindow,
    TrackingCriterion,
};
pub use dispatch::{DeliveryId, DispatchPolicy, DispatchRecord};
pub use feed::{AlertDefinition, MovieSubmission, ShowtimeSubmission, Submission};
