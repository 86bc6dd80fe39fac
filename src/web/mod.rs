use crate::db::RatingStore;
use crate::error::PredictorError;
use crate::models::{
    OutcomeProbabilities, PredictionRequest, PredictionResult, RatingSnapshot, ScrapedRating,
};
use crate::regression::OutcomeModel;
use crate::scrapers::{fetch_validated, store_ratings, RatingSource};
use crate::utils::history::MatchHistory;
use crate::utils::odds::round2;
use crate::utils::prediction::predict_match;
use askama::Template;
use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

// Custom filters for formatting
mod filters {
    pub fn format_percent(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}%", value))
    }

    pub fn format_odds(odds: &Option<f64>) -> ::askama::Result<String> {
        Ok(match odds {
            Some(odds) => format!("{:.2}", odds),
            None => "∞".to_string(),
        })
    }

    pub fn format_goals(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }
}

/// Shared handler state. The rating snapshot is swapped wholesale on refresh;
/// everything else is fixed at startup.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<Arc<RatingSnapshot>>>,
    pub model: Option<Arc<dyn OutcomeModel>>,
    pub history: Arc<MatchHistory>,
    pub store: Arc<Mutex<RatingStore>>,
    pub source: Arc<dyn RatingSource>,
}

impl AppState {
    pub fn new(
        store: RatingStore,
        snapshot: RatingSnapshot,
        model: Option<Arc<dyn OutcomeModel>>,
        history: MatchHistory,
        source: Arc<dyn RatingSource>,
    ) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            model,
            history: Arc::new(history),
            store: Arc::new(Mutex::new(store)),
            source,
        }
    }

    pub async fn current_snapshot(&self) -> Arc<RatingSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Store fetched ratings on the blocking pool and publish the new snapshot.
    ///
    /// The store lock is held until the snapshot is swapped, so concurrent
    /// refreshes publish in the order they were written.
    async fn apply_refresh(
        &self,
        ratings: Vec<ScrapedRating>,
        at: DateTime<Utc>,
    ) -> Result<Arc<RatingSnapshot>, PredictorError> {
        let store = self.store.clone();
        let current = self.snapshot.clone();

        tokio::task::spawn_blocking(move || -> Result<Arc<RatingSnapshot>, PredictorError> {
            let mut store = store.blocking_lock();
            let snapshot = Arc::new(store_ratings(&mut store, &ratings, at)?);
            *current.blocking_write() = snapshot.clone();
            Ok(snapshot)
        })
        .await
        .map_err(|e| PredictorError::Persistence(format!("rating update task failed: {}", e)))?
    }

    /// Run the prediction pipeline against the current snapshot
    pub async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResult, PredictorError> {
        let model = self.model.as_ref().ok_or_else(|| {
            PredictorError::DataUnavailable("the prediction model is not loaded".to_string())
        })?;
        let snapshot = self.current_snapshot().await;

        match predict_match(&snapshot, model.as_ref(), &self.history, request) {
            Err(PredictorError::TeamNotFound(_)) if snapshot.is_empty() => {
                Err(PredictorError::DataUnavailable(
                    "no Elo ratings are stored yet; update the ratings first".to_string(),
                ))
            }
            Err(PredictorError::Model(message)) => Err(PredictorError::DataUnavailable(
                format!("the prediction model is unusable: {}", message),
            )),
            other => other,
        }
    }
}

/// HTTP status for an error caught at the request boundary
pub fn status_for(err: &PredictorError) -> StatusCode {
    match err {
        PredictorError::TeamNotFound(_) | PredictorError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        PredictorError::ExternalFetch(_) => StatusCode::BAD_GATEWAY,
        PredictorError::DataUnavailable(_)
        | PredictorError::Persistence(_)
        | PredictorError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Prediction as returned to clients: probabilities in percent, values rounded
/// to two places, infinite odds as `null`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionView {
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub expected_home_goals: f64,
    pub expected_away_goals: f64,
    pub elo_diff: i32,
    pub home_rating: i32,
    pub away_rating: i32,
    pub home_prob: f64,
    pub draw_prob: f64,
    pub away_prob: f64,
    pub odds_home_win: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away_win: Option<f64>,
    pub model_probabilities: Option<OutcomeProbabilities>,
    pub betting_odds: Vec<String>,
    pub previous_matchups: Vec<String>,
}

fn finite_odds(odds: f64) -> Option<f64> {
    odds.is_finite().then(|| round2(odds))
}

fn as_percentages(probs: &OutcomeProbabilities) -> OutcomeProbabilities {
    OutcomeProbabilities {
        home_win: round2(probs.home_win * 100.0),
        draw: round2(probs.draw * 100.0),
        away_win: round2(probs.away_win * 100.0),
    }
}

impl From<&PredictionResult> for PredictionView {
    fn from(result: &PredictionResult) -> Self {
        let percent = as_percentages(&result.probabilities);
        Self {
            home_team: result.home_team.clone(),
            away_team: result.away_team.clone(),
            home_score: result.home_score,
            away_score: result.away_score,
            expected_home_goals: round2(result.expected_home_goals),
            expected_away_goals: round2(result.expected_away_goals),
            elo_diff: result.elo_diff,
            home_rating: result.home_rating,
            away_rating: result.away_rating,
            home_prob: percent.home_win,
            draw_prob: percent.draw,
            away_prob: percent.away_win,
            odds_home_win: finite_odds(result.odds.home_win),
            odds_draw: finite_odds(result.odds.draw),
            odds_away_win: finite_odds(result.odds.away_win),
            model_probabilities: result.model_probabilities.as_ref().map(as_percentages),
            betting_odds: result.betting_odds_lines.clone(),
            previous_matchups: result.previous_matchup_lines.clone(),
        }
    }
}

/// One line of the ratings table
#[derive(Debug, Clone, Serialize)]
pub struct TeamRow {
    pub position: usize,
    pub team: String,
    pub elo: i32,
}

fn team_rows(snapshot: &RatingSnapshot) -> Vec<TeamRow> {
    snapshot
        .sorted_by_rating()
        .into_iter()
        .enumerate()
        .map(|(i, r)| TeamRow {
            position: i + 1,
            team: r.name.clone(),
            elo: r.rating,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    teams: Vec<TeamRow>,
    last_update: String,
    selected_home: String,
    selected_away: String,
    error: Option<String>,
    prediction: Option<PredictionView>,
}

impl IndexTemplate {
    fn new(snapshot: &RatingSnapshot) -> Self {
        Self {
            teams: team_rows(snapshot),
            last_update: snapshot
                .last_update()
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default(),
            selected_home: String::new(),
            selected_away: String::new(),
            error: None,
            prediction: None,
        }
    }
}

struct HtmlTemplate<T>(StatusCode, T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.1.render() {
            Ok(html) => (self.0, Html(html)).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.current_snapshot().await;
    HtmlTemplate(StatusCode::OK, IndexTemplate::new(&snapshot))
}

/// Form fields posted by the page; missing fields arrive as empty strings
#[derive(Debug, Default, Deserialize)]
struct PredictForm {
    #[serde(default)]
    home_team: String,
    #[serde(default)]
    away_team: String,
}

/// `POST /predict`: JSON in gives JSON out, a form post renders the page
async fn predict(State(state): State<AppState>, request: Request) -> Response {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        match Json::<PredictionRequest>::from_request(request, &state).await {
            Ok(Json(body)) => predict_json(&state, body).await,
            Err(rejection) => json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
        }
    } else {
        match Form::<PredictForm>::from_request(request, &state).await {
            Ok(Form(form)) => predict_page(&state, form).await,
            Err(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()).into_response(),
        }
    }
}

async fn predict_json(state: &AppState, body: PredictionRequest) -> Response {
    match state.predict(&body).await {
        Ok(result) => {
            info!(
                "Predicted {} {} - {} {}",
                result.home_team, result.home_score, result.away_score, result.away_team
            );
            Json(PredictionView::from(&result)).into_response()
        }
        Err(err) => {
            log_request_error(&err);
            json_error(status_for(&err), err.to_string())
        }
    }
}

async fn predict_page(state: &AppState, form: PredictForm) -> Response {
    let request = PredictionRequest {
        home_team: form.home_team.clone(),
        away_team: form.away_team.clone(),
        custom_elos: None,
    };
    let result = state.predict(&request).await;
    let snapshot = state.current_snapshot().await;

    let mut page = IndexTemplate::new(&snapshot);
    page.selected_home = form.home_team;
    page.selected_away = form.away_team;

    let status = match result {
        Ok(result) => {
            page.prediction = Some(PredictionView::from(&result));
            StatusCode::OK
        }
        Err(err) => {
            log_request_error(&err);
            page.error = Some(err.to_string());
            status_for(&err)
        }
    };

    HtmlTemplate(status, page).into_response()
}

fn log_request_error(err: &PredictorError) {
    if err.is_user_error() {
        warn!("Rejected prediction request: {}", err);
    } else {
        error!("Prediction failed: {}", err);
    }
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    status: &'static str,
    teams: Vec<TeamRow>,
    timestamp: String,
}

/// `POST /update_elo`: scrape, store and swap in a fresh snapshot
async fn update_elo(State(state): State<AppState>) -> Response {
    let at = Utc::now();
    let result = match fetch_validated(state.source.as_ref()).await {
        Ok(ratings) => state.apply_refresh(ratings, at).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(snapshot) => {
            let teams = team_rows(&snapshot);
            info!("Ratings refreshed: {} teams", teams.len());
            Json(UpdateResponse {
                status: "success",
                teams,
                timestamp: at.to_rfc3339(),
            })
            .into_response()
        }
        Err(err) => {
            error!("Rating update failed: {}", err);
            (
                status_for(&err),
                Json(serde_json::json!({ "status": "error", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        // This will serve files from the static directory at the "/static" URL path
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/update_elo", post(update_elo))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::{normalize_team_key, MatchRecord, ScrapedRating};
    use crate::regression::{FeatureSet, LinearModel, OutputSet};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http;
    use serde_json::Value;
    use tower::ServiceExt;

    struct StaticSource(Vec<ScrapedRating>);

    #[async_trait]
    impl RatingSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_ratings(&self) -> Result<Vec<ScrapedRating>> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl RatingSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_ratings(&self) -> Result<Vec<ScrapedRating>> {
            Err(PredictorError::ExternalFetch("503 Service Unavailable".to_string()))
        }
    }

    /// Fails the fetch if the store is locked while the scrape runs
    struct LockCheckingSource(Arc<Mutex<RatingStore>>);

    #[async_trait]
    impl RatingSource for LockCheckingSource {
        fn name(&self) -> &str {
            "lock-checking"
        }

        async fn fetch_ratings(&self) -> Result<Vec<ScrapedRating>> {
            if self.0.try_lock().is_err() {
                return Err(PredictorError::ExternalFetch(
                    "store locked during fetch".to_string(),
                ));
            }
            Ok(vec![scraped("Liverpool", 2040)])
        }
    }

    fn scraped(team: &str, elo: i32) -> ScrapedRating {
        ScrapedRating {
            team: team.to_string(),
            elo,
        }
    }

    fn model() -> Arc<dyn OutcomeModel> {
        Arc::new(
            LinearModel::new(
                FeatureSet::EloPair,
                OutputSet::Goals,
                vec![vec![0.01, -0.01], vec![-0.005, 0.005]],
                vec![1.5, 1.1],
            )
            .unwrap(),
        )
    }

    fn state_with(source: Arc<dyn RatingSource>, model: Option<Arc<dyn OutcomeModel>>) -> AppState {
        let mut store = RatingStore::in_memory().unwrap();
        store
            .save_snapshot(
                &[scraped("Liverpool", 2015), scraped("Man City", 1917), scraped("Arsenal", 1987)],
                Utc::now(),
            )
            .unwrap();
        let snapshot = store.load_snapshot().unwrap();
        let history = MatchHistory::new(vec![MatchRecord {
            season: "2024/25".to_string(),
            home_team: "Man City".to_string(),
            away_team: "Liverpool".to_string(),
            home_key: normalize_team_key("Man City"),
            away_key: normalize_team_key("Liverpool"),
            home_goals: 0,
            away_goals: 2,
        }]);
        AppState::new(store, snapshot, model, history, source)
    }

    fn app(state: AppState) -> Router {
        router(state, Path::new("static"))
    }

    fn json_request(uri: &str, body: Value) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_teams() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Liverpool"));
        assert!(html.contains("2015"));
    }

    #[tokio::test]
    async fn test_predict_json() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({ "home_team": "Liverpool", "away_team": "man city" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["home_team"], "Liverpool");
        assert_eq!(body["elo_diff"], 98);
        assert_eq!(body["home_score"], 2);
        assert_eq!(body["away_score"], 1);
        assert_eq!(body["home_prob"], 52.0);
        assert_eq!(body["draw_prob"], 23.48);
        assert_eq!(body["away_prob"], 24.52);
        assert_eq!(body["odds_home_win"], 1.92);
        assert_eq!(body["previous_matchups"][1], "Season: 2024/25, Man City 0 - 2 Liverpool");
    }

    #[tokio::test]
    async fn test_predict_json_custom_elos() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({
                    "home_team": "Arsenal",
                    "away_team": "Liverpool",
                    "custom_elos": { "Arsenal": 2015 }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["elo_diff"], 0);
        assert_eq!(body["draw_prob"], 30.0);
    }

    #[tokio::test]
    async fn test_predict_json_same_team() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({ "home_team": "Arsenal", "away_team": "arsenal" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("cannot be the same"));
    }

    #[tokio::test]
    async fn test_predict_json_unknown_team() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({ "home_team": "Arsenal", "away_team": "Luton" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Team not found: Luton");
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let state = state_with(Arc::new(DownSource), None);
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({ "home_team": "Arsenal", "away_team": "Liverpool" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_predict_form_renders_page() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let request = http::Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("home_team=Liverpool&away_team=Man+City"))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Home Win Odds: 1.92"));
        assert!(html.contains("Season: 2024/25, Man City 0 - 2 Liverpool"));
    }

    #[tokio::test]
    async fn test_predict_form_same_team_shows_error() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let request = http::Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("home_team=Arsenal&away_team=Arsenal"))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("Home and Away teams cannot be the same."));
    }

    #[tokio::test]
    async fn test_update_elo_swaps_snapshot() {
        let source = StaticSource(vec![scraped("Liverpool", 2030), scraped("Brentford", 1760)]);
        let state = state_with(Arc::new(source), Some(model()));

        let response = app(state.clone())
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/update_elo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["teams"][0]["team"], "Liverpool");
        assert_eq!(body["teams"][0]["elo"], 2030);
        assert!(body["timestamp"].is_string());

        let snapshot = state.current_snapshot().await;
        assert_eq!(snapshot.get("liverpool").map(|r| r.rating), Some(2030));
        assert_eq!(snapshot.get("brentford").map(|r| r.rating), Some(1760));
        // Teams missing from the refresh keep their last stored rating
        assert_eq!(snapshot.get("arsenal").map(|r| r.rating), Some(1987));
    }

    #[tokio::test]
    async fn test_update_elo_write_failure_keeps_snapshot() {
        // A zero rating passes the scrape checks but violates the store's constraint
        let source = StaticSource(vec![scraped("Liverpool", 2030), scraped("Luton", 0)]);
        let state = state_with(Arc::new(source), Some(model()));
        let before = state.current_snapshot().await;

        let response = app(state.clone())
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/update_elo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Persistence failure"));

        let after = state.current_snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.get("liverpool").map(|r| r.rating), Some(2015));
        let store = state.store.lock().await;
        assert_eq!(store.rating_count().unwrap(), 3);
        assert_eq!(store.team_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_elo_fetches_without_store_lock() {
        let mut state = state_with(Arc::new(DownSource), Some(model()));
        state.source = Arc::new(LockCheckingSource(state.store.clone()));

        let response = app(state.clone())
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/update_elo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = state.current_snapshot().await;
        assert_eq!(snapshot.get("liverpool").map(|r| r.rating), Some(2040));
    }

    #[tokio::test]
    async fn test_predict_json_rejects_extreme_custom_elo() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let response = app(state)
            .oneshot(json_request(
                "/predict",
                serde_json::json!({
                    "home_team": "Arsenal",
                    "away_team": "Liverpool",
                    "custom_elos": { "Arsenal": i32::MAX, "Liverpool": -5 }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Custom Elo"));
    }

    #[tokio::test]
    async fn test_update_elo_failure_keeps_snapshot() {
        let state = state_with(Arc::new(DownSource), Some(model()));
        let before = state.current_snapshot().await;

        let response = app(state.clone())
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/update_elo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");

        let after = state.current_snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(state.store.lock().await.rating_count().unwrap(), 3);
    }
}
