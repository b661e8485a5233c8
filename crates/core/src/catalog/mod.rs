//! Remote metadata catalog.
//!
//! The reconciliation engine only depends on [`CatalogResolver`]; the HTTP
//! client in [`http`] is one implementation of it.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{keys, Game};

/// HTTP implementation of [`CatalogResolver`].
pub mod http;

pub use http::HttpCatalog;

/// Errors raised by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport-level failure.
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The catalog answered with a non-success status.
    #[error("catalog returned status {0}")]
    Status(u16),
    /// The lookup did not finish in time.
    #[error("catalog lookup timed out")]
    Timeout,
    /// The catalog could not be reached for another reason.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// One game as described by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog identifier; the lowest one wins when names tie.
    pub igdb_id: i64,
    /// Canonical name.
    pub name: String,
    /// Long-form description.
    #[serde(default)]
    pub summary: Option<String>,
    /// Icon path or URL.
    #[serde(default)]
    pub icon: Option<String>,
    /// Header artwork path or URL.
    #[serde(default)]
    pub header_img: Option<String>,
    /// Age or critic rating.
    #[serde(default)]
    pub rating: Option<String>,
    /// Genres, comma separated.
    #[serde(default)]
    pub genre: Option<String>,
    /// Developer credit.
    #[serde(default)]
    pub developer: Option<String>,
    /// Publisher credit.
    #[serde(default)]
    pub publisher: Option<String>,
    /// Display release date.
    #[serde(default)]
    pub release_date: Option<String>,
}

impl CatalogRecord {
    /// Copy every non-empty field of the record onto `game`.
    pub fn apply_to(&self, game: &mut Game) {
        if let Some(icon) = non_empty(&self.icon) {
            game.icon = icon.to_string();
        }
        let fields = [
            (keys::DESCRIPTION, &self.summary),
            (keys::HEADER_IMG, &self.header_img),
            (keys::RATING, &self.rating),
            (keys::GENRE, &self.genre),
            (keys::DEVELOPER, &self.developer),
            (keys::PUBLISHER, &self.publisher),
            (keys::RELEASE_DATE, &self.release_date),
        ];
        for (key, value) in fields {
            if let Some(value) = non_empty(value) {
                game.metadata.insert(key.to_string(), value.to_string());
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Async lookup service for game metadata.
///
/// Implementations should bound each call in time; callers treat an error
/// or an empty result as "no match".
pub trait CatalogResolver: Send + Sync {
    /// Records associated with a Steam app id.
    fn resolve_by_id(
        &self,
        steam_id: &str,
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, CatalogError>> + Send;

    /// Records whose name matches `name`.
    fn resolve_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, CatalogError>> + Send;
}

/// Pick the record named exactly `name` with the lowest catalog id.
pub fn pick_match<'a>(records: &'a [CatalogRecord], name: &str) -> Option<&'a CatalogRecord> {
    records
        .iter()
        .filter(|record| record.name == name)
        .min_by_key(|record| record.igdb_id)
}
