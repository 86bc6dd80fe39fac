pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod regression;
pub mod scrapers;
pub mod utils;
pub mod web;

pub use error::{PredictorError, Result};
pub use models::*;
pub use utils::*;

use config::AppConfig;
use db::RatingStore;
use regression::{LinearModel, OutcomeModel};
use scrapers::clubelo::ClubEloScraper;
use std::sync::Arc;
use tracing::{error, info, warn};
use utils::data::load_match_records;
use utils::history::MatchHistory;
use web::AppState;

/// Load everything the web server needs at startup.
///
/// Only the rating store is required. A missing model or match file is logged
/// and leaves predictions (or previous matchups) unavailable until fixed.
pub async fn load_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = RatingStore::open(&config.database_path)?;
    let snapshot = store.load_snapshot()?;
    if snapshot.is_empty() {
        warn!(
            "No ratings stored in {}; POST /update_elo to fetch them",
            config.database_path.display()
        );
    } else {
        info!("Loaded ratings for {} teams", snapshot.len());
    }

    let model: Option<Arc<dyn OutcomeModel>> = match LinearModel::load(&config.model_path) {
        Ok(model) => {
            info!("Loaded model from {}", config.model_path.display());
            Some(Arc::new(model))
        }
        Err(e) => {
            error!("Prediction model unavailable: {:#}", e);
            None
        }
    };

    let history = match load_match_records(&config.match_data_path, &config.seasons) {
        Ok(records) => {
            info!("Loaded {} historical matches", records.len());
            MatchHistory::new(records)
        }
        Err(e) => {
            error!("Match history unavailable: {:#}", e);
            MatchHistory::new(Vec::new())
        }
    };

    let source = Arc::new(ClubEloScraper::with_url(config.clubelo_url.clone()));

    Ok(AppState::new(store, snapshot, model, history, source))
}
