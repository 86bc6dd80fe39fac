use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use epl_elo_predictor::config::AppConfig;
use epl_elo_predictor::data::{load_match_records, load_rating_seeds, save_ratings_to_csv};
use epl_elo_predictor::db::RatingStore;
use epl_elo_predictor::history::MatchHistory;
use epl_elo_predictor::prediction::predict_match;
use epl_elo_predictor::regression::training::{merge_matches_with_ratings, train_model};
use epl_elo_predictor::regression::{LinearModel, OutputSet};
use epl_elo_predictor::scrapers::clubelo::ClubEloScraper;
use epl_elo_predictor::scrapers::{refresh_ratings, validate_ratings};
use epl_elo_predictor::{PredictionRequest, RatingSnapshot, ScrapedRating};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "EPL Elo ratings, model training and match predictions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the current ratings from clubelo.com and store them
    UpdateElo {
        /// Also write the scraped table to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Seed the store from a Team,Elo CSV file
    ImportRatings { csv: PathBuf },
    /// Print the current ratings
    Ratings,
    /// Fit the outcome model on historical matches and current ratings
    Train {
        /// Also fit win/draw/loss probabilities
        #[arg(long)]
        outcomes: bool,
        /// Where to write the model (defaults to MODEL_PATH)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Predict a single match
    Predict {
        home: String,
        away: String,
        /// Override a team's rating, e.g. --elo "Man City=1950"
        #[arg(long = "elo", value_name = "TEAM=RATING")]
        custom_elos: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load environment variables from .env file
    let config = AppConfig::from_env();

    // Initialize logging
    tracing_subscriber::fmt::init();

    match cli.command {
        Command::UpdateElo { csv } => update_elo(&config, csv).await,
        Command::ImportRatings { csv } => import_ratings(&config, csv),
        Command::Ratings => show_ratings(&config),
        Command::Train { outcomes, out } => train(&config, outcomes, out),
        Command::Predict {
            home,
            away,
            custom_elos,
        } => predict(&config, home, away, &custom_elos),
    }
}

async fn update_elo(config: &AppConfig, csv: Option<PathBuf>) -> Result<()> {
    println!("Fetching ratings from {}...\n", config.clubelo_url);

    let scraper = ClubEloScraper::with_url(config.clubelo_url.clone());
    let mut store = RatingStore::open(&config.database_path)?;
    let snapshot = refresh_ratings(&scraper, &mut store, Utc::now())
        .await
        .context("Failed to update ratings")?;

    print_ratings(&snapshot);

    if let Some(path) = csv {
        let ratings: Vec<ScrapedRating> = snapshot
            .sorted_by_rating()
            .into_iter()
            .map(|r| ScrapedRating {
                team: r.name.clone(),
                elo: r.rating,
            })
            .collect();
        save_ratings_to_csv(&ratings, &path)?;
        println!("\nSaved ratings to: {}", path.display());
    }

    Ok(())
}

fn import_ratings(config: &AppConfig, csv: PathBuf) -> Result<()> {
    let ratings = load_rating_seeds(&csv)?;
    validate_ratings(&ratings)?;

    let mut store = RatingStore::open(&config.database_path)?;
    let written = store.save_snapshot(&ratings, Utc::now())?;
    println!(
        "Imported {} ratings into {}",
        written,
        config.database_path.display()
    );
    Ok(())
}

fn show_ratings(config: &AppConfig) -> Result<()> {
    let store = RatingStore::open(&config.database_path)?;
    let snapshot = store.load_snapshot()?;
    if snapshot.is_empty() {
        println!("No ratings stored yet. Run `cli update-elo` first.");
        return Ok(());
    }
    print_ratings(&snapshot);
    Ok(())
}

fn print_ratings(snapshot: &RatingSnapshot) {
    if let Some(at) = snapshot.last_update() {
        println!("Ratings as of {}\n", at.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("{:<4} {:<25} {:>6}", "#", "Team", "Elo");
    println!("{}", "-".repeat(37));
    for (i, rating) in snapshot.sorted_by_rating().iter().enumerate() {
        println!("{:<4} {:<25} {:>6}", i + 1, rating.name, rating.rating);
    }
}

fn train(config: &AppConfig, outcomes: bool, out: Option<PathBuf>) -> Result<()> {
    let store = RatingStore::open(&config.database_path)?;
    let snapshot = store.load_snapshot()?;
    if snapshot.is_empty() {
        return Err(anyhow!("No ratings stored; run `cli update-elo` first"));
    }

    let matches = load_match_records(&config.match_data_path, &config.seasons)?;
    let rows = merge_matches_with_ratings(&matches, &snapshot);
    println!(
        "Training on {} of {} matches with rated teams\n",
        rows.len(),
        matches.len()
    );

    let output_set = if outcomes {
        OutputSet::OutcomeAndGoals
    } else {
        OutputSet::Goals
    };
    let report = train_model(&rows, output_set)?;

    println!("Train samples: {}", report.train_samples);
    println!("Test samples:  {}", report.test_samples);
    match &report.test_metrics {
        Some(metrics) => {
            println!("\n--- Test Metrics ---");
            println!("R²:                     {:.4}", metrics.r2);
            println!("MAE home goals:         {:.4}", metrics.mae_home_goals);
            println!("MAE away goals:         {:.4}", metrics.mae_away_goals);
            println!("R² (rounded):           {:.4}", metrics.r2_rounded);
            println!(
                "MAE home goals (rounded): {:.4}",
                metrics.mae_home_goals_rounded
            );
            println!(
                "MAE away goals (rounded): {:.4}",
                metrics.mae_away_goals_rounded
            );
        }
        None => println!("Not enough matches for a test set"),
    }

    let path = out.unwrap_or_else(|| config.model_path.clone());
    report.model.save(&path)?;
    println!("\nSaved model to: {}", path.display());
    Ok(())
}

/// "Man City=1950" -> ("Man City", 1950)
fn parse_custom_elo(value: &str) -> Result<(String, i32)> {
    let (team, rating) = value
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("Expected TEAM=RATING, got '{}'", value))?;
    let rating = rating
        .trim()
        .parse()
        .with_context(|| format!("Invalid rating in '{}'", value))?;
    Ok((team.trim().to_string(), rating))
}

fn predict(config: &AppConfig, home: String, away: String, custom_elos: &[String]) -> Result<()> {
    let store = RatingStore::open(&config.database_path)?;
    let snapshot = store.load_snapshot()?;
    let model = LinearModel::load(&config.model_path)?;
    let history = match load_match_records(&config.match_data_path, &config.seasons) {
        Ok(records) => MatchHistory::new(records),
        Err(e) => {
            eprintln!("Warning: match history unavailable: {:#}", e);
            MatchHistory::new(Vec::new())
        }
    };

    let custom_elos = if custom_elos.is_empty() {
        None
    } else {
        Some(
            custom_elos
                .iter()
                .map(|v| parse_custom_elo(v))
                .collect::<Result<BTreeMap<_, _>>>()?,
        )
    };

    let request = PredictionRequest {
        home_team: home,
        away_team: away,
        custom_elos,
    };
    let result = predict_match(&snapshot, &model, &history, &request)?;

    println!(
        "{} ({}) vs {} ({})",
        result.home_team, result.home_rating, result.away_team, result.away_rating
    );
    println!(
        "Predicted score: {} {} - {} {}",
        result.home_team, result.home_score, result.away_score, result.away_team
    );
    println!(
        "Expected goals:  {:.2} - {:.2}",
        result.expected_home_goals, result.expected_away_goals
    );
    println!(
        "Probabilities:   home {:.2}%, draw {:.2}%, away {:.2}%\n",
        result.probabilities.home_win * 100.0,
        result.probabilities.draw * 100.0,
        result.probabilities.away_win * 100.0
    );
    for line in &result.betting_odds_lines {
        println!("{}", line);
    }
    println!();
    for line in &result.previous_matchup_lines {
        println!("{}", line);
    }
    Ok(())
}
