//! Persisted documents and the in-memory operations applied to them.
//!
//! Each document is read, modified and written back as a whole by a storage
//! backend, so every operation here either fully succeeds or leaves the
//! document untouched.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    CatalogQuery, CatalogRecord, CriterionDraft, CriterionId, DispatchRecord, Movie, MovieKey,
    Showtime, ShowtimeRow, Theatre, TheatreKey, TrackingCriterion, UpsertSummary,
};
use crate::utils::pattern_matches;

/// `catalog.json`: movies, theatres and showtimes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CatalogDocument {
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub theatres: Vec<Theatre>,
    #[serde(default)]
    pub showtimes: Vec<Showtime>,
}

impl CatalogDocument {
    /// Apply a batch of upserts. Existing identities are left as they are.
    ///
    /// A showtime referencing an unknown movie or theatre rejects the whole
    /// batch and leaves the document untouched.
    pub fn apply(&mut self, records: &[CatalogRecord]) -> Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        let mut new_movies = Vec::new();
        let mut new_theatres = Vec::new();
        let mut new_showtimes = Vec::new();

        {
            let mut movie_keys: HashSet<MovieKey> = self.movies.iter().map(Movie::key).collect();
            let mut theatre_keys: HashSet<TheatreKey> =
                self.theatres.iter().map(Theatre::key).collect();
            let mut showtime_keys: HashSet<_> =
                self.showtimes.iter().map(Showtime::identity).collect();

            for record in records {
                match record {
                    CatalogRecord::Movie(movie) => {
                        if movie_keys.insert(movie.key()) {
                            new_movies.push(movie);
                            summary.movies_added += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                    CatalogRecord::Theatre(theatre) => {
                        if theatre_keys.insert(theatre.key()) {
                            new_theatres.push(theatre);
                            summary.theatres_added += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                    CatalogRecord::Showtime(showtime) => {
                        if !movie_keys.contains(&showtime.movie) {
                            return Err(AppError::validation(format!(
                                "Showtime references unknown movie {}/{}",
                                showtime.movie.slug, showtime.movie.city
                            )));
                        }
                        if !theatre_keys.contains(&showtime.theatre) {
                            return Err(AppError::validation(format!(
                                "Showtime references unknown theatre {}/{}",
                                showtime.theatre.name, showtime.theatre.city
                            )));
                        }
                        if showtime_keys.insert(showtime.identity()) {
                            new_showtimes.push(showtime);
                            summary.showtimes_added += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                }
            }
        }

        if summary.added() > 0 {
            self.movies.extend(new_movies.into_iter().cloned());
            self.theatres.extend(new_theatres.into_iter().cloned());
            self.showtimes.extend(new_showtimes.into_iter().cloned());
            self.updated_at = Some(Utc::now());
        }
        Ok(summary)
    }

    /// Showtimes joined with movie and theatre, in insertion order.
    pub fn query(&self, query: &CatalogQuery) -> Vec<ShowtimeRow> {
        self.query_many(std::slice::from_ref(query))
            .pop()
            .unwrap_or_default()
    }

    /// Answer several queries with a single join over the catalog.
    pub fn query_many(&self, queries: &[CatalogQuery]) -> Vec<Vec<ShowtimeRow>> {
        let movies: HashMap<MovieKey, &Movie> =
            self.movies.iter().map(|m| (m.key(), m)).collect();
        let theatres: HashMap<TheatreKey, &Theatre> =
            self.theatres.iter().map(|t| (t.key(), t)).collect();
        let joined: Vec<(&Showtime, &Movie, &Theatre)> = self
            .showtimes
            .iter()
            .filter_map(|s| Some((s, *movies.get(&s.movie)?, *theatres.get(&s.theatre)?)))
            .collect();

        queries
            .iter()
            .map(|query| {
                let city = query.city.trim();
                joined
                    .iter()
                    .filter(|(_, movie, _)| movie.city.trim().eq_ignore_ascii_case(city))
                    .filter(|(_, movie, _)| {
                        pattern_matches(&movie.title, query.title_pattern.as_deref())
                    })
                    .filter(|(_, _, theatre)| {
                        pattern_matches(&theatre.name, query.theatre_pattern.as_deref())
                    })
                    .map(|(s, movie, theatre)| ShowtimeRow {
                        movie: (*movie).clone(),
                        theatre: (*theatre).clone(),
                        show_date: s.show_date.clone(),
                        show_time: s.show_time.clone(),
                        link: s.link.clone(),
                        page_text: s.page_text.clone(),
                    })
                    .collect()
            })
            .collect()
    }
}

/// `criteria.json`: tracking criteria and the id sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriteriaDocument {
    #[serde(default = "first_id")]
    pub next_id: CriterionId,
    #[serde(default)]
    pub criteria: Vec<TrackingCriterion>,
}

fn first_id() -> CriterionId {
    1
}

impl Default for CriteriaDocument {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            criteria: Vec::new(),
        }
    }
}

impl CriteriaDocument {
    /// Create or update a criterion from a draft.
    ///
    /// An explicit id updates that criterion and re-activates it. Without an
    /// id, an active criterion with the same natural key is updated in place;
    /// otherwise a new one is created.
    pub fn save(&mut self, draft: CriterionDraft, now: DateTime<Utc>) -> Result<TrackingCriterion> {
        let draft = draft.normalized()?;

        let position = match draft.id {
            Some(id) => Some(
                self.criteria
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| AppError::validation(format!("Unknown criterion id {id}")))?,
            ),
            None => {
                let key = draft.natural_key();
                self.criteria
                    .iter()
                    .position(|c| c.active && c.natural_key() == key)
            }
        };

        match position {
            Some(index) => {
                let criterion = &mut self.criteria[index];
                criterion.title_pattern = draft.title_pattern;
                criterion.theatre_pattern = draft.theatre_pattern;
                criterion.city = draft.city;
                criterion.format_pattern = draft.format_pattern;
                criterion.filters = draft.filters;
                criterion.destination = draft.destination;
                if draft.reference_url.is_some() {
                    criterion.reference_url = draft.reference_url;
                }
                criterion.active = true;
                criterion.updated_at = now;
                Ok(criterion.clone())
            }
            None => {
                let criterion = TrackingCriterion {
                    id: self.next_id,
                    title_pattern: draft.title_pattern,
                    theatre_pattern: draft.theatre_pattern,
                    city: draft.city,
                    format_pattern: draft.format_pattern,
                    filters: draft.filters,
                    destination: draft.destination,
                    reference_url: draft.reference_url,
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                self.next_id += 1;
                self.criteria.push(criterion.clone());
                Ok(criterion)
            }
        }
    }

    pub fn get(&self, id: CriterionId) -> Option<&TrackingCriterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    /// Flip the active flag. Returns the updated criterion, or `None` if unknown.
    pub fn set_active(
        &mut self,
        id: CriterionId,
        active: bool,
        now: DateTime<Utc>,
    ) -> Option<TrackingCriterion> {
        let criterion = self.criteria.iter_mut().find(|c| c.id == id)?;
        if criterion.active != active {
            criterion.active = active;
            criterion.updated_at = now;
        }
        Some(criterion.clone())
    }
}

/// `dispatch.json`: one record per criterion.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LedgerDocument {
    #[serde(default)]
    pub records: Vec<DispatchRecord>,
}

impl LedgerDocument {
    pub fn get(&self, id: CriterionId) -> Option<&DispatchRecord> {
        self.records.iter().find(|r| r.criterion_id == id)
    }

    /// Replace the record for the criterion, keeping one record per criterion.
    pub fn put(&mut self, record: DispatchRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.criterion_id == record.criterion_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Filter, TimeWindow};

    fn movie(title: &str, slug: &str) -> Movie {
        Movie {
            title: title.into(),
            slug: slug.into(),
            city: "Chennai".into(),
            language: "Tamil".into(),
            format: "2D".into(),
        }
    }

    fn showtime(slug: &str, theatre: &str, time: &str) -> Showtime {
        Showtime {
            movie: MovieKey {
                slug: slug.into(),
                city: "Chennai".into(),
            },
            theatre: TheatreKey {
                name: theatre.into(),
                city: "Chennai".into(),
            },
            show_date: "2026-10-19".into(),
            show_time: time.into(),
            link: String::new(),
            page_text: None,
        }
    }

    fn sample_batch() -> Vec<CatalogRecord> {
        vec![
            CatalogRecord::Movie(movie("Test Film", "test-film")),
            CatalogRecord::Theatre(Theatre::new("PVR Chennai", "Chennai")),
            CatalogRecord::Theatre(Theatre::new("INOX Marina", "Chennai")),
            CatalogRecord::Showtime(showtime("test-film", "PVR Chennai", "07:30 PM")),
            CatalogRecord::Showtime(showtime("test-film", "INOX Marina", "10:00 AM")),
        ]
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut doc = CatalogDocument::default();
        let first = doc.apply(&sample_batch()).unwrap();
        assert_eq!(first.movies_added, 1);
        assert_eq!(first.theatres_added, 2);
        assert_eq!(first.showtimes_added, 2);

        let snapshot = doc.clone();
        let second = doc.apply(&sample_batch()).unwrap();
        assert_eq!(second.added(), 0);
        assert_eq!(second.unchanged, 5);
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_large_batch_reapply_is_noop() {
        let mut batch = vec![
            CatalogRecord::Movie(movie("Test Film", "test-film")),
            CatalogRecord::Theatre(Theatre::new("PVR Chennai", "Chennai")),
        ];
        for i in 0..20_000 {
            let time = format!("{:02}:{:02}", i % 24, i % 60);
            let mut show = showtime("test-film", "PVR Chennai", &time);
            show.show_date = format!("day-{i}");
            batch.push(CatalogRecord::Showtime(show));
        }

        let mut doc = CatalogDocument::default();
        assert_eq!(doc.apply(&batch).unwrap().showtimes_added, 20_000);

        let stamp = doc.updated_at;
        let again = doc.apply(&batch).unwrap();
        assert_eq!(again.added(), 0);
        assert_eq!(again.unchanged, 20_002);
        assert_eq!(doc.showtimes.len(), 20_000);
        assert_eq!(doc.updated_at, stamp);
    }

    #[test]
    fn test_duplicates_within_batch_count_once() {
        let mut batch = sample_batch();
        batch.push(CatalogRecord::Showtime(showtime("test-film", "PVR Chennai", "07:30 PM")));

        let mut doc = CatalogDocument::default();
        let summary = doc.apply(&batch).unwrap();
        assert_eq!(summary.showtimes_added, 2);
        assert_eq!(summary.unchanged, 1);
    }

    #[test]
    fn test_orphan_showtime_rejects_batch() {
        let mut doc = CatalogDocument::default();
        let batch = vec![
            CatalogRecord::Movie(movie("Test Film", "test-film")),
            CatalogRecord::Showtime(showtime("test-film", "Nowhere", "07:30 PM")),
        ];
        assert!(doc.apply(&batch).is_err());
        assert!(doc.movies.is_empty());
        assert!(doc.updated_at.is_none());
    }

    #[test]
    fn test_query_many_matches_individual_queries() {
        let mut doc = CatalogDocument::default();
        doc.apply(&sample_batch()).unwrap();

        let queries = vec![
            CatalogQuery {
                city: "Chennai".into(),
                theatre_pattern: Some("inox".into()),
                ..Default::default()
            },
            CatalogQuery {
                city: "Mumbai".into(),
                ..Default::default()
            },
        ];
        let results = doc.query_many(&queries);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], doc.query(&queries[0]));
        assert_eq!(results[0].len(), 1);
        assert!(results[1].is_empty());
    }

    #[test]
    fn test_query_filters_city_and_patterns() {
        let mut doc = CatalogDocument::default();
        doc.apply(&sample_batch()).unwrap();

        let all = doc.query(&CatalogQuery {
            city: "chennai".into(),
            ..Default::default()
        });
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].theatre.name, "PVR Chennai");

        let pvr = doc.query(&CatalogQuery {
            city: "Chennai".into(),
            title_pattern: Some("test".into()),
            theatre_pattern: Some("pvr".into()),
        });
        assert_eq!(pvr.len(), 1);
        assert_eq!(pvr[0].show_time, "07:30 PM");

        let elsewhere = doc.query(&CatalogQuery {
            city: "Mumbai".into(),
            ..Default::default()
        });
        assert!(elsewhere.is_empty());
    }

    #[test]
    fn test_save_creates_then_updates_by_natural_key() {
        let mut doc = CriteriaDocument::default();
        let now = Utc::now();
        let draft = CriterionDraft {
            title_pattern: Some("Test Film".into()),
            city: "Chennai".into(),
            ..Default::default()
        };

        let created = doc.save(draft.clone(), now).unwrap();
        assert_eq!(created.id, 1);

        let mut changed = draft;
        changed.title_pattern = Some("test film".into());
        changed.filters = vec![Filter::TimeWindow(TimeWindow::Night)];
        let updated = doc.save(changed, now).unwrap();

        assert_eq!(updated.id, 1);
        assert_eq!(doc.criteria.len(), 1);
        assert_eq!(doc.criteria[0].filters.len(), 1);
    }

    #[test]
    fn test_save_with_unknown_id_fails() {
        let mut doc = CriteriaDocument::default();
        let draft = CriterionDraft {
            id: Some(42),
            city: "Chennai".into(),
            ..Default::default()
        };
        assert!(doc.save(draft, Utc::now()).is_err());
    }

    #[test]
    fn test_deactivated_criterion_is_not_reused() {
        let mut doc = CriteriaDocument::default();
        let now = Utc::now();
        let draft = CriterionDraft {
            city: "Chennai".into(),
            ..Default::default()
        };
        let first = doc.save(draft.clone(), now).unwrap();
        doc.set_active(first.id, false, now).unwrap();

        let second = doc.save(draft, now).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(doc.criteria.len(), 2);
        assert!(!doc.get(first.id).unwrap().active);
    }

    #[test]
    fn test_ledger_put_replaces() {
        let mut ledger = LedgerDocument::default();
        let now = Utc::now();
        let first = DispatchRecord::next(None, 7, "aaa".into(), 1, "SM1".into(), now);
        ledger.put(first.clone());
        let second = DispatchRecord::next(Some(&first), 7, "bbb".into(), 2, "SM2".into(), now);
        ledger.put(second);

        assert_eq!(ledger.records.len(), 1);
        let record = ledger.get(7).unwrap();
        assert_eq!(record.fingerprint, "bbb");
        assert_eq!(record.send_count, 2);
    }
}
