use clap::Parser;
use epl_elo_predictor::config::AppConfig;
use epl_elo_predictor::load_app_state;
use epl_elo_predictor::logging::init_logging;
use epl_elo_predictor::web::router;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "web")]
#[command(about = "Serve the EPL match predictor")]
struct Args {
    /// Address to listen on (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// SQLite ratings database (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Trained model file (overrides MODEL_PATH)
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load environment variables
    let mut config = AppConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }

    // Initialize logging
    let _guard = init_logging(&config.log_dir);

    let state = match load_app_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to load application state: {:#}", e);
            std::process::exit(1);
        }
    };

    let app = router(state, &config.static_dir);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
