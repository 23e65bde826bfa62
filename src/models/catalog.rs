//! Movie, Theatre and Showtime catalog records.

use serde::{Deserialize, Serialize};

/// Identity of a movie within the catalog: `(slug, city)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieKey {
    pub slug: String,
    pub city: String,
}

/// Identity of a theatre within the catalog: `(name, city)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TheatreKey {
    pub name: String,
    pub city: String,
}

/// A movie listed in a city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    /// Display title as ingested
    pub title: String,

    /// Opaque catalog key from the ticketing source
    pub slug: String,

    pub city: String,

    #[serde(default)]
    pub language: String,

    /// Screen format (e.g. "IMAX 2D")
    #[serde(default)]
    pub format: String,
}

impl Movie {
    pub fn key(&self) -> MovieKey {
        MovieKey {
            slug: self.slug.clone(),
            city: self.city.clone(),
        }
    }
}

/// A venue in a city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Theatre {
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub slug: String,
}

impl Theatre {
    /// Create a theatre, deriving its slug from the name.
    pub fn new(name: impl Into<String>, city: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self {
            name,
            city: city.into(),
            slug,
        }
    }

    pub fn key(&self) -> TheatreKey {
        TheatreKey {
            name: self.name.clone(),
            city: self.city.clone(),
        }
    }
}

/// A bookable screening of a movie at a theatre.
///
/// Identity is `(movie, theatre, show_date, show_time)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Showtime {
    pub movie: MovieKey,
    pub theatre: TheatreKey,

    /// Calendar date (YYYY-MM-DD)
    pub show_date: String,

    /// Local time as listed by the source (e.g. "07:30 PM")
    pub show_time: String,

    #[serde(default)]
    pub link: String,

    /// Booking page text captured at ingestion, searched by content filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_text: Option<String>,
}

impl Showtime {
    /// Identity tuple: `(movie, theatre, show_date, show_time)`.
    pub fn identity(&self) -> (&MovieKey, &TheatreKey, &str, &str) {
        (&self.movie, &self.theatre, &self.show_date, &self.show_time)
    }

    /// Whether two showtimes denote the same screening.
    pub fn same_identity(&self, other: &Showtime) -> bool {
        self.identity() == other.identity()
    }
}

/// A single catalog upsert.
#[derive(Debug, Clone)]
pub enum CatalogRecord {
    Movie(Movie),
    Theatre(Theatre),
    Showtime(Showtime),
}

/// Outcome of a catalog upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub movies_added: usize,
    pub theatres_added: usize,
    pub showtimes_added: usize,
    /// Records whose identity already existed
    pub unchanged: usize,
}

impl UpsertSummary {
    pub fn added(&self) -> usize {
        self.movies_added + self.theatres_added + self.showtimes_added
    }
}

/// Catalog lookup parameters.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub city: String,
    pub title_pattern: Option<String>,
    pub theatre_pattern: Option<String>,
}

/// A showtime joined with its movie and theatre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowtimeRow {
    pub movie: Movie,
    pub theatre: Theatre,
    pub show_date: String,
    pub show_time: String,
    pub link: String,
    pub page_text: Option<String>,
}

impl ShowtimeRow {
    /// Text searched by content filters: title, venue, format, language and page text.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![
            self.movie.title.as_str(),
            self.theatre.name.as_str(),
            self.movie.format.as_str(),
            self.movie.language.as_str(),
        ];
        if let Some(text) = &self.page_text {
            parts.push(text.as_str());
        }
        parts.join(" ")
    }

    /// Key that uniquely identifies this match in a notification.
    pub fn match_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.movie.title, self.theatre.name, self.show_date, self.show_time
        )
    }
}

/// Lowercase ASCII-alphanumeric slug.
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
