use crate::scrapers::clubelo::CLUBELO_URL;
use std::path::PathBuf;

/// Runtime settings, read from the environment (and `.env`) with defaults
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub model_path: PathBuf,
    pub match_data_path: PathBuf,
    /// Seasons of match history to load; empty means all
    pub seasons: Vec<String>,
    pub clubelo_url: String,
    pub bind_addr: String,
    pub static_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/elo.db"),
            model_path: PathBuf::from("models/elo_model.json"),
            match_data_path: PathBuf::from("data/raw/england.csv"),
            seasons: vec!["2023/24".to_string(), "2024/25".to_string()],
            clubelo_url: CLUBELO_URL.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then overlay any set variables on the defaults
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            model_path: var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            match_data_path: var("MATCH_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.match_data_path),
            seasons: var("SEASONS")
                .map(|s| parse_seasons(&s))
                .unwrap_or(defaults.seasons),
            clubelo_url: var("CLUBELO_URL").unwrap_or(defaults.clubelo_url),
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            log_dir: var("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
        }
    }
}

/// "2023/24, 2024/25" -> ["2023/24", "2024/25"]; "all" -> []
pub fn parse_seasons(value: &str) -> Vec<String> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
