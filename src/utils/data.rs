use crate::models::{normalize_team_key, MatchRecord, ScrapedRating};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One row of the historical results CSV (football-data column names)
#[derive(Debug, Deserialize)]
struct MatchCsvRow {
    #[serde(rename = "Season")]
    season: String,
    #[serde(rename = "HomeTeam")]
    home_team: String,
    #[serde(rename = "AwayTeam")]
    away_team: String,
    #[serde(rename = "FTHG")]
    home_goals: Option<u32>,
    #[serde(rename = "FTAG")]
    away_goals: Option<u32>,
}

/// One row of a `Team,Elo` ratings CSV
#[derive(Debug, Deserialize)]
struct RatingCsvRow {
    #[serde(rename = "Team")]
    team: String,
    #[serde(rename = "Elo")]
    elo: String,
}

#[derive(Debug, Serialize)]
struct RatingCsvRecord<'a> {
    #[serde(rename = "Team")]
    team: &'a str,
    #[serde(rename = "Elo")]
    elo: i32,
}

/// Parse a rating cell, ignoring anything that isn't a digit ("1,917" -> 1917)
pub fn parse_rating(text: &str) -> Option<i32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i32>().ok()
}

/// Read match results, keeping only the given seasons (all seasons if empty).
/// Rows without a final score are skipped.
pub fn read_match_records<R: Read>(reader: R, seasons: &[String]) -> Result<Vec<MatchRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<MatchCsvRow>() {
        let row = row.context("Failed to parse match row")?;

        if !seasons.is_empty() && !seasons.iter().any(|s| s == row.season.trim()) {
            continue;
        }

        let (home_goals, away_goals) = match (row.home_goals, row.away_goals) {
            (Some(home), Some(away)) => (home, away),
            _ => continue,
        };

        let home_team = row.home_team.trim().to_string();
        let away_team = row.away_team.trim().to_string();

        records.push(MatchRecord {
            season: row.season.trim().to_string(),
            home_key: normalize_team_key(&home_team),
            away_key: normalize_team_key(&away_team),
            home_team,
            away_team,
            home_goals,
            away_goals,
        });
    }

    Ok(records)
}

/// Load match results from a CSV file
pub fn load_match_records(path: &Path, seasons: &[String]) -> Result<Vec<MatchRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open match data {}", path.display()))?;
    read_match_records(file, seasons)
}

/// Read a `Team,Elo` ratings CSV
pub fn read_rating_seeds<R: Read>(reader: R) -> Result<Vec<ScrapedRating>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut ratings = Vec::new();

    for row in csv_reader.deserialize::<RatingCsvRow>() {
        let row = row.context("Failed to parse rating row")?;
        let elo = parse_rating(&row.elo)
            .with_context(|| format!("Invalid rating {:?} for {}", row.elo, row.team))?;

        ratings.push(ScrapedRating {
            team: row.team.trim().to_string(),
            elo,
        });
    }

    Ok(ratings)
}

pub fn load_rating_seeds(path: &Path) -> Result<Vec<ScrapedRating>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open ratings file {}", path.display()))?;
    read_rating_seeds(file)
}

/// Write ratings in the same `Team,Elo` layout the importer reads
pub fn write_ratings_csv<W: Write>(ratings: &[ScrapedRating], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for rating in ratings {
        csv_writer
            .serialize(RatingCsvRecord {
                team: &rating.team,
                elo: rating.elo,
            })
            .context("Failed to write rating row")?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Save ratings to a CSV file
pub fn save_ratings_to_csv(ratings: &[ScrapedRating], filename: &Path) -> Result<()> {
    if let Some(parent) = filename.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(filename).context("Failed to create CSV file")?;
    write_ratings_csv(ratings, file)
}
