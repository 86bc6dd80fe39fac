//! SQLite storage for teams and their timestamped Elo ratings

use crate::error::{PredictorError, Result};
use crate::models::{normalize_team_key, RatingSnapshot, ScrapedRating, TeamRating};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Rating history store. Refreshes only ever insert new rows, so the
/// current rating of a team is its row with the latest `last_update`.
pub struct RatingStore {
    conn: Connection,
}

impl RatingStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PredictorError::Persistence(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        let store = RatingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = RatingStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS elo_ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                rating INTEGER NOT NULL CHECK (rating > 0),
                last_update TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_elo_ratings_team
                ON elo_ratings(team_id, last_update);
            "#,
        )?;
        Ok(())
    }

    /// Insert one rating per team, all stamped with `at`, creating teams as needed.
    /// Runs in a single transaction: if any row fails, nothing is written.
    pub fn save_snapshot(
        &mut self,
        ratings: &[ScrapedRating],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let stamp = format_timestamp(at);
        let tx = self.conn.transaction()?;

        for rating in ratings {
            let key = normalize_team_key(&rating.team);
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM teams WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            // Display the spelling that came with the team's newest rating
            let team_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE teams SET name = ?1
                         WHERE id = ?2 AND NOT EXISTS (
                             SELECT 1 FROM elo_ratings
                             WHERE team_id = ?2 AND last_update > ?3
                         )",
                        params![rating.team, id, stamp],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO teams (key, name, created_at) VALUES (?1, ?2, ?3)",
                        params![key, rating.team, stamp],
                    )?;
                    debug!("Created team {} ({})", rating.team, key);
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "INSERT INTO elo_ratings (team_id, rating, last_update) VALUES (?1, ?2, ?3)",
                params![team_id, rating.elo, stamp],
            )?;
        }

        tx.commit()?;
        info!("Stored {} ratings at {}", ratings.len(), stamp);
        Ok(ratings.len())
    }

    /// The most recent rating of every team
    pub fn latest_ratings(&self) -> Result<Vec<TeamRating>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.key, t.name, r.rating, r.last_update
             FROM elo_ratings r
             JOIN teams t ON t.id = r.team_id
             WHERE r.id = (
                 SELECT r2.id FROM elo_ratings r2
                 WHERE r2.team_id = r.team_id
                 ORDER BY r2.last_update DESC, r2.id DESC
                 LIMIT 1
             )
             ORDER BY r.rating DESC, t.name",
        )?;

        let ratings = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let name: String = row.get(1)?;
                let rating: i32 = row.get(2)?;
                let stamp: String = row.get(3)?;
                let last_update = parse_timestamp(&stamp).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                })?;
                Ok(TeamRating {
                    key,
                    name,
                    rating,
                    last_update,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ratings)
    }

    /// Build an immutable snapshot of the current ratings
    pub fn load_snapshot(&self) -> Result<RatingSnapshot> {
        Ok(RatingSnapshot::new(self.latest_ratings()?, Utc::now()))
    }

    pub fn team_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn rating_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM elo_ratings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Fixed-width UTC timestamps so that text order matches time order
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}
