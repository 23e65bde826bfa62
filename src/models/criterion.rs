//! Tracking criteria and their filters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Prefix marking a time-window token in the alert feed.
pub const TIME_PREFIX: &str = "TIME:";

/// Identifier of a tracking criterion.
pub type CriterionId = u64;

/// Time-of-day window a showtime falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeWindow {
    /// [05:00, 12:00)
    Morning,
    /// [12:00, 16:00)
    Afternoon,
    /// [16:00, 20:00)
    Evening,
    /// [20:00, 24:00) and [00:00, 05:00)
    Night,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Morning,
        TimeWindow::Afternoon,
        TimeWindow::Evening,
        TimeWindow::Night,
    ];

    /// Classify a 24-hour clock hour. Hours outside 0..24 wrap.
    pub fn classify(hour: u32) -> Self {
        match hour % 24 {
            5..=11 => TimeWindow::Morning,
            12..=15 => TimeWindow::Afternoon,
            16..=19 => TimeWindow::Evening,
            _ => TimeWindow::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Morning => "MORNING",
            TimeWindow::Afternoon => "AFTERNOON",
            TimeWindow::Evening => "EVENING",
            TimeWindow::Night => "NIGHT",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MORNING" => Ok(TimeWindow::Morning),
            "AFTERNOON" => Ok(TimeWindow::Afternoon),
            "EVENING" => Ok(TimeWindow::Evening),
            "NIGHT" => Ok(TimeWindow::Night),
            other => Err(AppError::validation(format!("Unknown time window '{other}'"))),
        }
    }
}

/// A parsed filter token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Filter {
    /// Case-insensitive substring searched in the candidate's text
    Content(String),
    TimeWindow(TimeWindow),
}

impl Filter {
    /// Parse a feed token. `TIME:<WINDOW>` names a time window; anything else is content.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("Empty filter token"));
        }
        match token.strip_prefix(TIME_PREFIX) {
            Some(window) => Ok(Filter::TimeWindow(window.parse()?)),
            None => Ok(Filter::Content(token.to_string())),
        }
    }

    /// Render back into the feed token form.
    pub fn to_token(&self) -> String {
        match self {
            Filter::Content(text) => text.clone(),
            Filter::TimeWindow(window) => format!("{TIME_PREFIX}{window}"),
        }
    }

    /// Parse a list of tokens, failing on the first invalid one.
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Self>> {
        tokens.iter().map(|t| Self::parse(t.as_ref())).collect()
    }
}

/// A user's standing request to be notified about matching showtimes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingCriterion {
    pub id: CriterionId,

    /// Title substring; `None` matches every title
    #[serde(default)]
    pub title_pattern: Option<String>,

    /// Theatre substring; `None` matches every theatre
    #[serde(default)]
    pub theatre_pattern: Option<String>,

    pub city: String,

    /// Movie format substring; `None` matches every format
    #[serde(default)]
    pub format_pattern: Option<String>,

    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Opaque channel address; falls back to the notifier default when absent
    #[serde(default)]
    pub destination: Option<String>,

    /// Reference link supplied by the alert source
    #[serde(default)]
    pub reference_url: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl TrackingCriterion {
    pub fn content_filters(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().filter_map(|f| match f {
            Filter::Content(text) => Some(text.as_str()),
            Filter::TimeWindow(_) => None,
        })
    }

    pub fn time_windows(&self) -> impl Iterator<Item = TimeWindow> + '_ {
        self.filters.iter().filter_map(|f| match f {
            Filter::TimeWindow(window) => Some(*window),
            Filter::Content(_) => None,
        })
    }

    /// Human-readable description of the search terms.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!(
            "'{}'",
            self.title_pattern.as_deref().unwrap_or("*")
        )];
        parts.push(format!("in {}", self.city));
        if let Some(theatre) = &self.theatre_pattern {
            parts.push(format!("at '{theatre}'"));
        }
        if let Some(format) = &self.format_pattern {
            parts.push(format!("format '{format}'"));
        }
        if !self.filters.is_empty() {
            let tokens: Vec<String> = self.filters.iter().map(Filter::to_token).collect();
            parts.push(format!("[{}]", tokens.join(", ")));
        }
        parts.join(" ")
    }

    /// Case-insensitive natural key used to match drafts to existing criteria.
    pub fn natural_key(&self) -> (String, String, String, String) {
        natural_key(
            &self.city,
            self.title_pattern.as_deref(),
            self.theatre_pattern.as_deref(),
            self.destination.as_deref(),
        )
    }
}

/// Requested changes for `add_or_update_criterion`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriterionDraft {
    /// Target an existing criterion explicitly
    pub id: Option<CriterionId>,
    pub title_pattern: Option<String>,
    pub theatre_pattern: Option<String>,
    pub city: String,
    pub format_pattern: Option<String>,
    pub filters: Vec<Filter>,
    pub destination: Option<String>,
    pub reference_url: Option<String>,
}

impl CriterionDraft {
    /// Trim fields and turn blank patterns into wildcards.
    pub fn normalized(mut self) -> Result<Self> {
        self.city = self.city.trim().to_string();
        if self.city.is_empty() {
            return Err(AppError::validation("Criterion city is required"));
        }
        self.title_pattern = non_blank(self.title_pattern);
        self.theatre_pattern = non_blank(self.theatre_pattern);
        self.format_pattern = non_blank(self.format_pattern);
        self.destination = non_blank(self.destination);
        self.reference_url = non_blank(self.reference_url);
        Ok(self)
    }

    pub fn natural_key(&self) -> (String, String, String, String) {
        natural_key(
            &self.city,
            self.title_pattern.as_deref(),
            self.theatre_pattern.as_deref(),
            self.destination.as_deref(),
        )
    }
}

/// Current patterns of a criterion, as reported to the command interface.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CriterionStatus {
    pub id: CriterionId,
    pub active: bool,
    pub title_pattern: Option<String>,
    pub theatre_pattern: Option<String>,
    pub city: String,
    pub format_pattern: Option<String>,
    pub filters: Vec<String>,
    pub destination: Option<String>,
}

impl From<&TrackingCriterion> for CriterionStatus {
    fn from(c: &TrackingCriterion) -> Self {
        Self {
            id: c.id,
            active: c.active,
            title_pattern: c.title_pattern.clone(),
            theatre_pattern: c.theatre_pattern.clone(),
            city: c.city.clone(),
            format_pattern: c.format_pattern.clone(),
            filters: c.filters.iter().map(Filter::to_token).collect(),
            destination: c.destination.clone(),
        }
    }
}

fn natural_key(
    city: &str,
    title: Option<&str>,
    theatre: Option<&str>,
    destination: Option<&str>,
) -> (String, String, String, String) {
    let fold = |s: Option<&str>| s.unwrap_or("").trim().to_lowercase();
    (
        city.trim().to_lowercase(),
        fold(title),
        fold(theatre),
        fold(destination),
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
