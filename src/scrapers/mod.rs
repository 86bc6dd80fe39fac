pub mod clubelo;

use crate::db::RatingStore;
use crate::error::{PredictorError, Result};
use crate::models::{normalize_team_key, RatingSnapshot, ScrapedRating};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

/// Anything that can produce the current rating of every team
#[async_trait]
pub trait RatingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_ratings(&self) -> Result<Vec<ScrapedRating>>;
}

/// Reject empty tables, blank names and teams listed twice
pub fn validate_ratings(ratings: &[ScrapedRating]) -> Result<()> {
    if ratings.is_empty() {
        return Err(PredictorError::ExternalFetch(
            "rating source returned no teams".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for rating in ratings {
        let key = normalize_team_key(&rating.team);
        if key.is_empty() {
            return Err(PredictorError::ExternalFetch(
                "rating source returned a blank team name".to_string(),
            ));
        }
        if !seen.insert(key) {
            return Err(PredictorError::ExternalFetch(format!(
                "team listed twice: {}",
                rating.team
            )));
        }
    }
    Ok(())
}

/// Fetch ratings from a source and check them before anything is written
pub async fn fetch_validated(source: &dyn RatingSource) -> Result<Vec<ScrapedRating>> {
    info!("Fetching ratings from {}", source.name());
    let ratings = source.fetch_ratings().await.map_err(|e| {
        warn!("Rating fetch from {} failed: {}", source.name(), e);
        e
    })?;
    validate_ratings(&ratings)?;
    Ok(ratings)
}

/// Write one snapshot of ratings and reload the current view. A failed write
/// is rolled back by the store, leaving the previous ratings current.
pub fn store_ratings(
    store: &mut RatingStore,
    ratings: &[ScrapedRating],
    at: DateTime<Utc>,
) -> Result<RatingSnapshot> {
    store.save_snapshot(ratings, at)?;
    store.load_snapshot()
}

/// Fetch fresh ratings, store them and return the new snapshot.
///
/// A fetch or validation failure returns before anything is written; a write
/// failure is rolled back by the store. Either way the caller keeps its old
/// snapshot.
pub async fn refresh_ratings(
    source: &dyn RatingSource,
    store: &mut RatingStore,
    at: DateTime<Utc>,
) -> Result<RatingSnapshot> {
    let ratings = fetch_validated(source).await?;
    store_ratings(store, &ratings, at)
}
