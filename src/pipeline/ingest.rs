//! Showtime ingestion from the scraping collaborator.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{
    CatalogRecord, Movie, MovieSubmission, Showtime, Submission, Theatre, TheatreKey,
    UpsertSummary,
};
use crate::storage::CatalogStore;

/// Outcome of one `submit_showtimes` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub movies_seen: usize,
    pub showtimes_seen: usize,
    /// Entries dropped because a required field was empty
    pub skipped: usize,
    pub upsert: UpsertSummary,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Build the catalog batch for one city: movies, distinct theatres, showtimes.
///
/// Invalid entries are skipped (and counted) instead of failing the batch.
pub fn build_batch(city: &str, movies: &[MovieSubmission]) -> (Vec<CatalogRecord>, usize) {
    let city = city.trim();
    let mut movie_records = Vec::new();
    let mut theatre_records = Vec::new();
    let mut showtime_records = Vec::new();
    let mut theatres_seen: HashSet<String> = HashSet::new();
    let mut skipped = 0;

    for movie in movies {
        if is_blank(&movie.title) || is_blank(&movie.slug) {
            log::warn!(
                "Skipping movie with empty title or slug in {}: {:?}",
                city,
                movie.title
            );
            skipped += 1;
            continue;
        }

        let movie_record = Movie {
            title: movie.title.trim().to_string(),
            slug: movie.slug.trim().to_string(),
            city: city.to_string(),
            language: movie.language.trim().to_string(),
            format: movie.format.trim().to_string(),
        };
        let movie_key = movie_record.key();
        movie_records.push(CatalogRecord::Movie(movie_record));

        for show in &movie.showtimes {
            if is_blank(&show.theatre) || is_blank(&show.date) || is_blank(&show.time) {
                log::warn!(
                    "Skipping showtime of {} with empty theatre, date or time",
                    movie.title.trim()
                );
                skipped += 1;
                continue;
            }

            let theatre_name = show.theatre.trim();
            if theatres_seen.insert(theatre_name.to_string()) {
                theatre_records.push(CatalogRecord::Theatre(Theatre::new(theatre_name, city)));
            }

            showtime_records.push(CatalogRecord::Showtime(Showtime {
                movie: movie_key.clone(),
                theatre: TheatreKey {
                    name: theatre_name.to_string(),
                    city: city.to_string(),
                },
                show_date: show.date.trim().to_string(),
                show_time: show.time.trim().to_string(),
                link: show.link.trim().to_string(),
                page_text: show.page_text.clone().filter(|t| !is_blank(t)),
            }));
        }
    }

    let mut batch = movie_records;
    batch.extend(theatre_records);
    batch.extend(showtime_records);
    (batch, skipped)
}

/// Ingest one city's movies into the catalog.
///
/// Safe to call repeatedly with overlapping data.
pub async fn submit_showtimes(
    store: &dyn CatalogStore,
    city: &str,
    movies: &[MovieSubmission],
) -> Result<IngestSummary> {
    if is_blank(city) {
        return Err(AppError::ingestion("Submission has no city"));
    }

    let (batch, skipped) = build_batch(city, movies);
    let upsert = store.upsert(&batch).await?;

    let summary = IngestSummary {
        movies_seen: movies.len(),
        showtimes_seen: movies.iter().map(|m| m.showtimes.len()).sum(),
        skipped,
        upsert,
    };
    log::info!(
        "Ingested {} ({} movies, {} showtimes): {} new records, {} skipped",
        city.trim(),
        summary.movies_seen,
        summary.showtimes_seen,
        upsert.added(),
        skipped
    );
    Ok(summary)
}

/// Read an ingestion file.
pub fn load_submission(path: impl AsRef<Path>) -> Result<Submission> {
    Submission::load(path)
}

/// Load and submit an ingestion file, degrading feed problems to zero new rows.
///
/// Storage failures still propagate.
pub async fn ingest_file(store: &dyn CatalogStore, path: &Path) -> Result<IngestSummary> {
    let submission = match load_submission(path) {
        Ok(submission) => submission,
        Err(e) => {
            log::warn!("Ingestion skipped: {}", e);
            return Ok(IngestSummary::default());
        }
    };

    match submit_showtimes(store, &submission.city, &submission.movies).await {
        Err(e) if !e.is_fatal() => {
            log::warn!("Ingestion of {} failed: {}", path.display(), e);
            Ok(IngestSummary::default())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogQuery, ShowtimeSubmission};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn show(theatre: &str, time: &str) -> ShowtimeSubmission {
        ShowtimeSubmission {
            theatre: theatre.into(),
            date: "2026-10-19".into(),
            time: time.into(),
            link: "https://example.com/book".into(),
            page_text: None,
        }
    }

    fn movies() -> Vec<MovieSubmission> {
        vec![MovieSubmission {
            title: "Test Film".into(),
            slug: "test-film".into(),
            language: "Tamil".into(),
            format: "2D".into(),
            showtimes: vec![
                show("PVR Chennai", "07:30 PM"),
                show("PVR Chennai", "10:00 PM"),
                show("INOX Marina", "02:00 PM"),
            ],
        }]
    }

    #[test]
    fn test_batch_orders_parents_first() {
        let (batch, skipped) = build_batch("Chennai", &movies());
        assert_eq!(skipped, 0);
        assert_eq!(batch.len(), 1 + 2 + 3);
        assert!(matches!(batch[0], CatalogRecord::Movie(_)));
        assert!(matches!(batch[1], CatalogRecord::Theatre(_)));
        assert!(matches!(batch[5], CatalogRecord::Showtime(_)));
    }

    #[test]
    fn test_batch_skips_blank_entries() {
        let mut input = movies();
        input[0].showtimes.push(show("", "11:00 AM"));
        input.push(MovieSubmission {
            title: " ".into(),
            slug: "blank".into(),
            language: String::new(),
            format: String::new(),
            showtimes: vec![show("PVR Chennai", "09:00 AM")],
        });

        let (batch, skipped) = build_batch("Chennai", &input);
        assert_eq!(skipped, 2);
        assert_eq!(batch.len(), 6);
    }

    #[tokio::test]
    async fn test_submit_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = submit_showtimes(&storage, "Chennai", &movies()).await.unwrap();
        assert_eq!(first.upsert.added(), 6);
        let snapshot = storage.counts().await.unwrap();

        let second = submit_showtimes(&storage, "Chennai", &movies()).await.unwrap();
        assert_eq!(second.upsert.added(), 0);
        assert_eq!(second.upsert.unchanged, 6);
        assert_eq!(storage.counts().await.unwrap(), snapshot);

        let rows = storage
            .query(&CatalogQuery {
                city: "chennai".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_nothing() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let summary = ingest_file(&storage, &tmp.path().join("missing.json"))
            .await
            .unwrap();
        assert_eq!(summary, IngestSummary::default());
    }

    #[tokio::test]
    async fn test_blank_city_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let err = submit_showtimes(&storage, "  ", &movies()).await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
    }
}
