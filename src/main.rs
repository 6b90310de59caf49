use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gather::command::{dispatch, State};
use gather::config::Config;
use gather::storage::Database;

/// Get the config directory path (~/.config/gather/)
fn default_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gather"))
}

#[derive(Parser, Debug)]
#[command(name = "gather", about = "Multi-user RSS aggregator CLI")]
struct Args {
    /// Override the config directory (defaults to ~/.config/gather)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Command to run: register, login, reset, users, agg, addfeed, feeds,
    /// follow, following, unfollow
    command: Option<String>,

    /// Arguments for the command
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let Some(command) = args.command else {
        eprintln!("Error: no command given");
        eprintln!();
        eprintln!("Usage: gather <command> [args...]");
        eprintln!("Commands: register, login, reset, users, agg, addfeed, feeds, follow, following, unfollow");
        std::process::exit(1);
    };

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = config_dir.join("config.toml");
    let config = Config::load(&config_path)?;

    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(|| config_dir.join("gather.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .context("Failed to open database")?;

    let mut state = State {
        db,
        client: reqwest::Client::new(),
        config,
        config_path,
    };

    if let Err(e) = dispatch(&mut state, &command, &args.args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
