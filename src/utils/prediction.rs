use crate::error::{PredictorError, Result};
use crate::models::{normalize_team_key, PredictionRequest, PredictionResult, RatingSnapshot};
use crate::regression::{round_goals, OutcomeModel};
use crate::utils::history::{previous_matchup_lines, MatchHistory};
use crate::utils::odds::{betting_odds_lines, decimal_odds, outcome_probabilities};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::debug;

/// Accepted values for a caller-supplied rating override
pub const CUSTOM_ELO_RANGE: RangeInclusive<i32> = 1..=5000;

/// Predict one fixture from the current ratings.
///
/// Read-only: the snapshot, model and history are borrowed for the duration of
/// the call and never modified.
pub fn predict_match(
    snapshot: &RatingSnapshot,
    model: &dyn OutcomeModel,
    history: &MatchHistory,
    request: &PredictionRequest,
) -> Result<PredictionResult> {
    let home_key = normalize_team_key(&request.home_team);
    let away_key = normalize_team_key(&request.away_team);

    if home_key.is_empty() || away_key.is_empty() {
        return Err(PredictorError::InvalidRequest(
            "Both a home and an away team are required.".to_string(),
        ));
    }
    if home_key == away_key {
        return Err(PredictorError::InvalidRequest(
            "Home and Away teams cannot be the same.".to_string(),
        ));
    }

    let home = snapshot
        .get(&home_key)
        .ok_or_else(|| PredictorError::TeamNotFound(request.home_team.trim().to_string()))?;
    let away = snapshot
        .get(&away_key)
        .ok_or_else(|| PredictorError::TeamNotFound(request.away_team.trim().to_string()))?;

    let mut overrides: HashMap<String, i32> = HashMap::new();
    for (team, rating) in request.custom_elos.iter().flatten() {
        if !CUSTOM_ELO_RANGE.contains(rating) {
            return Err(PredictorError::InvalidRequest(format!(
                "Custom Elo for {} must be between {} and {}, got {}",
                team.trim(),
                CUSTOM_ELO_RANGE.start(),
                CUSTOM_ELO_RANGE.end(),
                rating
            )));
        }
        overrides.insert(normalize_team_key(team), *rating);
    }
    let home_rating = overrides.get(&home_key).copied().unwrap_or(home.rating);
    let away_rating = overrides.get(&away_key).copied().unwrap_or(away.rating);
    let elo_diff = home_rating.checked_sub(away_rating).ok_or_else(|| {
        PredictorError::InvalidRequest(format!(
            "Elo ratings {} and {} are out of range",
            home_rating, away_rating
        ))
    })?;

    let features = model
        .feature_set()
        .features(f64::from(home_rating), f64::from(away_rating));
    let outputs = model.predict(&features)?;
    let output = model.output_set().interpret(&outputs)?;

    let probabilities = outcome_probabilities(f64::from(elo_diff));
    let odds = decimal_odds(&probabilities);

    let previous_matches = history.head_to_head(&home_key, &away_key);
    debug!(
        "{} ({}) vs {} ({}): {} previous meetings",
        home.name,
        home_rating,
        away.name,
        away_rating,
        previous_matches.len()
    );

    Ok(PredictionResult {
        home_team: home.name.clone(),
        away_team: away.name.clone(),
        home_rating,
        away_rating,
        elo_diff,
        expected_home_goals: output.expected_home_goals,
        expected_away_goals: output.expected_away_goals,
        home_score: round_goals(output.expected_home_goals),
        away_score: round_goals(output.expected_away_goals),
        probabilities,
        odds,
        model_probabilities: output.probabilities,
        betting_odds_lines: betting_odds_lines(&odds),
        previous_matchup_lines: previous_matchup_lines(&previous_matches),
        previous_matches,
    })
}
