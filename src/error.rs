use thiserror::Error;

/// Failures surfaced by the prediction and rating-refresh paths
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Model, ratings or match data missing at startup or request time
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Scrape or network failure; prior data is left untouched
    #[error("Failed to fetch ratings: {0}")]
    ExternalFetch(String),

    /// Write failure during refresh; the transaction is rolled back
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Model error: {0}")]
    Model(String),
}

impl PredictorError {
    /// True for errors caused by what the caller sent
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PredictorError::TeamNotFound(_) | PredictorError::InvalidRequest(_)
        )
    }
}

impl From<reqwest::Error> for PredictorError {
    fn from(err: reqwest::Error) -> Self {
        PredictorError::ExternalFetch(err.to_string())
    }
}

impl From<rusqlite::Error> for PredictorError {
    fn from(err: rusqlite::Error) -> Self {
        PredictorError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
