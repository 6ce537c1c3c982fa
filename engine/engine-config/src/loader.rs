//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::Path;
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MUZERO_CONFIG";

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by MUZERO_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = Path::new(&path);
        if path.exists() {
            info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
            return load_from_path(path);
        }
        warn!(
            "{}={} not found, searching defaults",
            CONFIG_ENV_VAR,
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
///
/// Unreadable or malformed files fall back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (bool, u32, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: MUZERO_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.data_dir, "MUZERO_COMMON_DATA_DIR");
    env_override!(config, common.env_name, "MUZERO_COMMON_ENV_NAME");
    env_override!(config, common.log_level, "MUZERO_COMMON_LOG_LEVEL");

    // MCTS
    env_override!(config, mcts.n_simulations, "MUZERO_MCTS_N_SIMULATIONS", parse);
    env_override!(config, mcts.root_dirichlet_alpha, "MUZERO_MCTS_ROOT_DIRICHLET_ALPHA", parse);
    env_override!(config, mcts.explore_frac, "MUZERO_MCTS_EXPLORE_FRAC", parse);
    env_override!(config, mcts.discount, "MUZERO_MCTS_DISCOUNT", parse);
    env_override!(config, mcts.support_width, "MUZERO_MCTS_SUPPORT_WIDTH", parse);
    env_override!(config, mcts.value_prefix, "MUZERO_MCTS_VALUE_PREFIX", parse);
    env_override!(config, mcts.categorical_value, "MUZERO_MCTS_CATEGORICAL_VALUE", parse);
    env_override!(config, mcts.pb_c_base, "MUZERO_MCTS_PB_C_BASE", parse);
    env_override!(config, mcts.pb_c_init, "MUZERO_MCTS_PB_C_INIT", parse);

    // Buffer
    env_override!(config, buffer.buffer_size, "MUZERO_BUFFER_BUFFER_SIZE", parse);
    env_override!(config, buffer.priority_replay, "MUZERO_BUFFER_PRIORITY_REPLAY", parse);
    env_override!(config, buffer.priority_alpha, "MUZERO_BUFFER_PRIORITY_ALPHA", parse);
    env_override!(
        config,
        buffer.initial_priority_beta,
        "MUZERO_BUFFER_INITIAL_PRIORITY_BETA",
        parse
    );
    env_override!(config, buffer.final_priority_beta, "MUZERO_BUFFER_FINAL_PRIORITY_BETA", parse);
    env_override!(config, buffer.max_total_frames, "MUZERO_BUFFER_MAX_TOTAL_FRAMES", parse);
    env_override!(config, buffer.rollout_depth, "MUZERO_BUFFER_ROLLOUT_DEPTH", parse);
    env_override!(config, buffer.reward_depth, "MUZERO_BUFFER_REWARD_DEPTH", parse);
    env_override!(
        config,
        buffer.off_policy_correction,
        "MUZERO_BUFFER_OFF_POLICY_CORRECTION",
        parse
    );
    env_override!(config, buffer.tau, "MUZERO_BUFFER_TAU", parse);
    env_override!(config, buffer.total_training_steps, "MUZERO_BUFFER_TOTAL_TRAINING_STEPS", parse);
    env_override!(config, buffer.batch_size, "MUZERO_BUFFER_BATCH_SIZE", parse);
    env_override!(config, buffer.load_buffer, "MUZERO_BUFFER_LOAD_BUFFER", parse);

    // Actor
    env_override!(config, actor.max_frames, "MUZERO_ACTOR_MAX_FRAMES", parse);
    env_override!(config, actor.max_games, "MUZERO_ACTOR_MAX_GAMES", parse);
    env_override!(config, actor.temp1, "MUZERO_ACTOR_TEMP1", parse);
    env_override!(config, actor.temp2, "MUZERO_ACTOR_TEMP2", parse);
    env_override!(config, actor.log_interval, "MUZERO_ACTOR_LOG_INTERVAL", parse);
    env_override!(config, actor.stats_interval_secs, "MUZERO_ACTOR_STATS_INTERVAL_SECS", parse);

    // Reanalyse
    env_override!(config, reanalyse.enabled, "MUZERO_REANALYSE_ENABLED", parse);
    env_override!(config, reanalyse.min_games, "MUZERO_REANALYSE_MIN_GAMES", parse);
    env_override!(config, reanalyse.idle_secs, "MUZERO_REANALYSE_IDLE_SECS", parse);

    // Model
    env_override!(config, model.latent_size, "MUZERO_MODEL_LATENT_SIZE", parse);
    env_override!(config, model.lstm_hidden_size, "MUZERO_MODEL_LSTM_HIDDEN_SIZE", parse);
    env_override!(config, model.seed, "MUZERO_MODEL_SEED", parse);
    config
}
