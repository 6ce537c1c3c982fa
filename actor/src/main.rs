//! Actor - MuZero self-play, reanalysis and replay sampling
//!
//! A long-running process that:
//! 1. Plays games with MCTS over a learned model
//! 2. Stores finished games in a prioritized replay buffer
//! 3. Reanalyses stale games with the latest model
//! 4. Samples training batches from the buffer
//! 5. Reloads model weights when `models/latest.json` changes
//! 6. Persists the buffer and run stats under the data directory

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod actor;
mod config;
mod env;
mod model_snapshot;
mod model_watcher;
mod player;
mod reanalyser;
mod reference_model;
mod stats;
mod trainer;

use crate::actor::Actor;
use crate::config::Config;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    let max_games_description = if config.max_games < 0 {
        "unlimited".to_string()
    } else {
        config.max_games.to_string()
    };
    info!(
        max_games = config.max_games,
        "Actor will play {} games on {}", max_games_description, config.env_name
    );

    let actor = Arc::new(Actor::new(config)?);

    // Setup graceful shutdown
    let shutdown_actor = Arc::clone(&actor);
    let shutdown_handle = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping actor...");
                shutdown_actor.shutdown();
            }
            Err(e) => error!("Failed to listen for ctrl+c: {}", e),
        }
    });

    let run_result = actor.run().await;
    shutdown_handle.abort();

    match run_result {
        Ok(()) => {
            info!("Actor completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Actor failed: {}", e);
            Err(e)
        }
    }
}
