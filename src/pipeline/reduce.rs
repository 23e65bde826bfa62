//! Match reduction: turns a criterion's passing rows into a notification.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ShowtimeRow, TrackingCriterion};
use crate::utils::title_key;

/// Reducer settings.
#[derive(Debug, Clone, Copy)]
pub struct ReduceOptions {
    /// Lines listed per movie before the remainder is summarized
    pub max_lines_per_movie: usize,
    /// Group by normalized title instead of the stored title
    pub merge_title_variants: bool,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            max_lines_per_movie: 5,
            merge_title_variants: false,
        }
    }
}

/// Matches for one movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieMatches {
    pub title: String,
    /// `venue @ time` lines in catalog order
    pub lines: Vec<String>,
}

/// A notification ready to be fingerprinted and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub header: String,
    pub movies: Vec<MovieMatches>,
    /// Every distinct match key, including lines truncated from the body
    pub match_keys: BTreeSet<String>,
}

impl Notification {
    pub fn match_count(&self) -> usize {
        self.match_keys.len()
    }

    /// Render the message body.
    pub fn render(&self, max_lines_per_movie: usize) -> String {
        let mut out = vec![self.header.clone()];
        for movie in &self.movies {
            out.push(String::new());
            out.push(format!("*{}*", movie.title));
            for line in movie.lines.iter().take(max_lines_per_movie) {
                out.push(format!("- {line}"));
            }
            if movie.lines.len() > max_lines_per_movie {
                out.push(format!(
                    "...and {} more.",
                    movie.lines.len() - max_lines_per_movie
                ));
            }
        }
        out.join("\n")
    }
}

/// Result of reducing one criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    NoMatch,
    Matched(Notification),
}

/// Group passing rows by movie and build the notification.
pub fn reduce(
    criterion: &TrackingCriterion,
    rows: &[ShowtimeRow],
    options: &ReduceOptions,
) -> Reduction {
    if rows.is_empty() {
        return Reduction::NoMatch;
    }

    let mut groups: BTreeMap<String, MovieMatches> = BTreeMap::new();
    let mut match_keys = BTreeSet::new();

    for row in rows {
        if !match_keys.insert(row.match_key()) {
            continue;
        }
        let key = if options.merge_title_variants {
            title_key(&row.movie.title)
        } else {
            row.movie.title.clone()
        };
        groups
            .entry(key)
            .or_insert_with(|| MovieMatches {
                title: row.movie.title.clone(),
                lines: Vec::new(),
            })
            .lines
            .push(format!("{} @ {}", row.theatre.name, row.show_time));
    }

    let movies: Vec<MovieMatches> = groups.into_values().collect();
    let label = match &criterion.title_pattern {
        Some(pattern) => pattern.clone(),
        None => movies
            .iter()
            .map(|m| m.title.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    };

    Reduction::Matched(Notification {
        header: format!("🎬 Alert for {} in {}:", label, criterion.city),
        movies,
        match_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{Movie, Theatre};

    fn criterion(title: Option<&str>) -> TrackingCriterion {
        TrackingCriterion {
            id: 1,
            title_pattern: title.map(String::from),
            theatre_pattern: None,
            city: "Chennai".into(),
            format_pattern: None,
            filters: vec![],
            destination: None,
            reference_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn row(title: &str, theatre: &str, time: &str) -> ShowtimeRow {
        ShowtimeRow {
            movie: Movie {
                title: title.into(),
                slug: title.to_lowercase().replace(' ', "-"),
                city: "Chennai".into(),
                language: String::new(),
                format: String::new(),
            },
            theatre: Theatre::new(theatre, "Chennai"),
            show_date: "2026-10-19".into(),
            show_time: time.into(),
            link: String::new(),
            page_text: None,
        }
    }

    fn matched(reduction: Reduction) -> Notification {
        match reduction {
            Reduction::Matched(n) => n,
            Reduction::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn test_no_rows_is_no_match() {
        assert_eq!(
            reduce(&criterion(None), &[], &ReduceOptions::default()),
            Reduction::NoMatch
        );
    }

    #[test]
    fn test_single_match_message() {
        let rows = vec![row("Test Film", "PVR Chennai", "07:30 PM")];
        let n = matched(reduce(&criterion(None), &rows, &ReduceOptions::default()));
        let body = n.render(5);

        assert!(body.contains("Alert for Test Film"));
        assert!(body.contains("*Test Film*"));
        assert!(body.contains("PVR Chennai @ 07:30 PM"));
        assert_eq!(n.match_count(), 1);
    }

    #[test]
    fn test_truncates_after_five_lines() {
        let times = ["10:00 AM", "11:00 AM", "01:00 PM", "03:00 PM", "05:00 PM", "07:00 PM", "09:00 PM"];
        let rows: Vec<_> = times
            .iter()
            .map(|t| row("Test Film", "PVR Chennai", t))
            .collect();
        let n = matched(reduce(&criterion(Some("Test")), &rows, &ReduceOptions::default()));
        let body = n.render(5);

        assert!(body.contains("PVR Chennai @ 05:00 PM"));
        assert!(!body.contains("PVR Chennai @ 07:00 PM"));
        assert!(body.ends_with("...and 2 more."));
        assert_eq!(n.match_count(), 7);
    }

    #[test]
    fn test_groups_by_stored_title() {
        let rows = vec![
            row("Test Film", "PVR Chennai", "07:30 PM"),
            row("TEST FILM", "INOX Marina", "08:00 PM"),
            row("Other Film", "PVR Chennai", "09:00 PM"),
        ];
        let n = matched(reduce(&criterion(None), &rows, &ReduceOptions::default()));
        assert_eq!(n.movies.len(), 3);
    }

    #[test]
    fn test_merges_title_variants_when_enabled() {
        let rows = vec![
            row("Test Film", "PVR Chennai", "07:30 PM"),
            row("TEST  FILM", "INOX Marina", "08:00 PM"),
        ];
        let options = ReduceOptions {
            merge_title_variants: true,
            ..Default::default()
        };
        let n = matched(reduce(&criterion(None), &rows, &options));
        assert_eq!(n.movies.len(), 1);
        assert_eq!(n.movies[0].title, "Test Film");
        assert_eq!(n.movies[0].lines.len(), 2);
    }

    #[test]
    fn test_header_uses_title_pattern() {
        let rows = vec![row("Test Film 2", "PVR Chennai", "07:30 PM")];
        let n = matched(reduce(&criterion(Some("Test")), &rows, &ReduceOptions::default()));
        assert_eq!(n.header, "🎬 Alert for Test in Chennai:");
    }
}
