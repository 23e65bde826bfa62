//! Filter evaluation: does a candidate showtime satisfy a criterion?
//!
//! Content filters and time-window filters are evaluated independently and
//! combined with AND. An empty filter set of either kind passes.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ShowtimeRow, TimeWindow, TrackingCriterion};
use crate::utils::{contains_ci, pattern_matches};

/// AM/PM marker of a listed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// A clock time found in showtime text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    /// `None` for 24-hour notation
    pub meridiem: Option<Meridiem>,
}

impl ClockTime {
    /// Hour on the 24-hour clock, or `None` if the listed time is not a valid clock time.
    pub fn hour24(&self) -> Option<u32> {
        if self.minute > 59 {
            return None;
        }
        match self.meridiem {
            Some(_) if self.hour == 0 || self.hour > 12 => None,
            Some(Meridiem::Pm) if self.hour == 12 => Some(12),
            Some(Meridiem::Pm) => Some(self.hour + 12),
            Some(Meridiem::Am) if self.hour == 12 => Some(0),
            Some(Meridiem::Am) => Some(self.hour),
            None if self.hour < 24 => Some(self.hour),
            None => None,
        }
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.hour24().map(TimeWindow::classify)
    }
}

fn time_regex() -> Option<&'static Regex> {
    static TIME_RE: OnceLock<Option<Regex>> = OnceLock::new();
    TIME_RE
        .get_or_init(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s?(AM|PM)?\b").ok())
        .as_ref()
}

/// Extract every clock time listed in the text.
pub fn extract_times(text: &str) -> Vec<ClockTime> {
    let Some(re) = time_regex() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let hour = caps.get(1)?.as_str().parse().ok()?;
            let minute = caps.get(2)?.as_str().parse().ok()?;
            let meridiem = caps.get(3).map(|m| {
                if m.as_str().eq_ignore_ascii_case("PM") {
                    Meridiem::Pm
                } else {
                    Meridiem::Am
                }
            });
            Some(ClockTime {
                hour,
                minute,
                meridiem,
            })
        })
        .collect()
}

/// Content filtering: any filter token appears in the text (case-insensitive).
pub fn matches_text(criterion: &TrackingCriterion, text: &str) -> bool {
    let mut tokens = criterion.content_filters().peekable();
    if tokens.peek().is_none() {
        return true;
    }
    tokens.any(|token| contains_ci(text, token))
}

/// Time filtering: any extracted time falls in a requested window.
///
/// With windows requested, text without any valid time fails.
pub fn matches_time(windows: &[TimeWindow], times: &[ClockTime]) -> bool {
    if windows.is_empty() {
        return true;
    }
    times
        .iter()
        .filter_map(ClockTime::window)
        .any(|window| windows.contains(&window))
}

/// Full evaluation of a catalog row against a criterion.
pub fn matches(criterion: &TrackingCriterion, row: &ShowtimeRow) -> bool {
    if !pattern_matches(&row.movie.format, criterion.format_pattern.as_deref()) {
        return false;
    }
    if !matches_text(criterion, &row.searchable_text()) {
        return false;
    }
    let windows: Vec<TimeWindow> = criterion.time_windows().collect();
    matches_time(&windows, &extract_times(&row.show_time))
}
