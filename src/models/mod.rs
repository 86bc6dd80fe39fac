use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Canonical lookup key for a team name: whitespace removed and lowercased,
/// so "Man City", " man city " and "mancity" all map to "mancity".
pub fn normalize_team_key(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

/// A team's current Elo rating as held in the rating store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub name: String,
    pub key: String,
    pub rating: i32,
    pub last_update: DateTime<Utc>,
}

/// A rating as read from an external source, before it is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRating {
    pub team: String,
    pub elo: i32,
}

/// Immutable view of the current rating per team.
///
/// Handlers share one of these behind an `Arc`; a refresh builds a new
/// snapshot and swaps it in wholesale rather than editing this one.
#[derive(Debug, Clone)]
pub struct RatingSnapshot {
    ratings: HashMap<String, TeamRating>,
    loaded_at: DateTime<Utc>,
}

impl RatingSnapshot {
    pub fn new(ratings: Vec<TeamRating>, loaded_at: DateTime<Utc>) -> Self {
        let ratings = ratings
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect();
        Self { ratings, loaded_at }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now())
    }

    pub fn get(&self, key: &str) -> Option<&TeamRating> {
        self.ratings.get(key)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Most recent rating timestamp across all teams
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.ratings.values().map(|r| r.last_update).max()
    }

    /// Teams ordered by rating, highest first (name breaks ties)
    pub fn sorted_by_rating(&self) -> Vec<&TeamRating> {
        let mut teams: Vec<&TeamRating> = self.ratings.values().collect();
        teams.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.name.cmp(&b.name)));
        teams
    }
}

/// A completed historical fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub season: String,
    pub home_team: String,
    pub away_team: String,
    pub home_key: String,
    pub away_key: String,
    pub home_goals: u32,
    pub away_goals: u32,
}

impl MatchRecord {
    /// True when this match was played between the two teams, either way round
    pub fn is_between(&self, team_a: &str, team_b: &str) -> bool {
        (self.home_key == team_a && self.away_key == team_b)
            || (self.home_key == team_b && self.away_key == team_a)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Season: {}, {} {} - {} {}",
            self.season, self.home_team, self.home_goals, self.away_goals, self.away_team
        )
    }
}

/// Win/draw/loss probabilities from the home side's perspective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

/// Decimal betting odds; an outcome with zero probability has infinite odds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalOdds {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

/// A match to predict. Team names are normalized before lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub home_team: String,
    pub away_team: String,
    /// Rating overrides keyed by team name
    #[serde(default)]
    pub custom_elos: Option<BTreeMap<String, i32>>,
}

/// Everything computed for one prediction; never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub home_team: String,
    pub away_team: String,
    pub home_rating: i32,
    pub away_rating: i32,
    pub elo_diff: i32,
    pub expected_home_goals: f64,
    pub expected_away_goals: f64,
    pub home_score: u32,
    pub away_score: u32,
    pub probabilities: OutcomeProbabilities,
    pub odds: DecimalOdds,
    /// Probabilities reported by the model itself, when it predicts outcomes
    pub model_probabilities: Option<OutcomeProbabilities>,
    pub previous_matches: Vec<MatchRecord>,
    pub betting_odds_lines: Vec<String>,
    pub previous_matchup_lines: Vec<String>,
}
