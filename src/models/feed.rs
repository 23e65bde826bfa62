//! Wire formats exchanged with the ingestion and alert-feed collaborators.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{CriterionDraft, Filter};

/// One showtime inside a movie submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowtimeSubmission {
    pub theatre: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub page_text: Option<String>,
}

/// A movie with its showtimes as supplied by the scraping collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieSubmission {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub showtimes: Vec<ShowtimeSubmission>,
}

/// An ingestion file: all movies scraped for one city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub city: String,
    #[serde(default)]
    pub movies: Vec<MovieSubmission>,
}

impl Submission {
    /// Load a submission file. Any read or parse failure is an ingestion error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::ingestion(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::ingestion(format!("{}: {e}", path.display())))
    }
}

/// One entry of the static alert feed.
///
/// Content and time filters share the `filters` list; `TIME:`-prefixed
/// tokens name a time window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertDefinition {
    /// Title fragment to track
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Destination address for this alert
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub theatre: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl AlertDefinition {
    /// Load the feed (a JSON array of definitions).
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::ingestion(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::ingestion(format!("{}: {e}", path.display())))
    }

    /// Convert into a criterion draft, parsing filter tokens once.
    pub fn to_draft(&self) -> Result<CriterionDraft> {
        let city = self
            .city
            .clone()
            .ok_or_else(|| AppError::validation("Alert definition has no city"))?;

        CriterionDraft {
            id: None,
            title_pattern: self.name.clone(),
            theatre_pattern: self.theatre.clone(),
            city,
            format_pattern: self.format.clone(),
            filters: Filter::parse_all(&self.filters)?,
            destination: self.phone.clone(),
            reference_url: self.url.clone(),
        }
        .normalized()
    }
}
