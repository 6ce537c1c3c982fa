//! Configuration for the actor binary
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by `ACTOR_*` env vars, then
//! config.toml (which itself honours `MUZERO_<SECTION>_<KEY>`).

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use engine_config::{load_config, CentralConfig};
use mcts::MctsConfig;
use once_cell::sync::Lazy;
use replay::BufferConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::reference_model::ModelSettings;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

/// Value of `key` parsed from the environment, or `fallback`.
fn env_or<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

// Default value functions that read from central config
fn default_env_name() -> String {
    env_or("ACTOR_ENV_NAME", CENTRAL_CONFIG.common.env_name.clone())
}
fn default_data_dir() -> String {
    env_or("ACTOR_DATA_DIR", CENTRAL_CONFIG.common.data_dir.clone())
}
fn default_log_level() -> String {
    env_or("ACTOR_LOG_LEVEL", CENTRAL_CONFIG.common.log_level.clone())
}
fn default_n_simulations() -> u32 {
    env_or("ACTOR_N_SIMULATIONS", CENTRAL_CONFIG.mcts.n_simulations)
}
fn default_root_dirichlet_alpha() -> f32 {
    env_or("ACTOR_ROOT_DIRICHLET_ALPHA", CENTRAL_CONFIG.mcts.root_dirichlet_alpha as f32)
}
fn default_explore_frac() -> f32 {
    env_or("ACTOR_EXPLORE_FRAC", CENTRAL_CONFIG.mcts.explore_frac as f32)
}
fn default_discount() -> f32 {
    env_or("ACTOR_DISCOUNT", CENTRAL_CONFIG.mcts.discount as f32)
}
fn default_support_width() -> usize {
    env_or("ACTOR_SUPPORT_WIDTH", CENTRAL_CONFIG.mcts.support_width)
}
fn default_value_prefix() -> bool {
    env_or("ACTOR_VALUE_PREFIX", CENTRAL_CONFIG.mcts.value_prefix)
}
fn default_categorical_value() -> bool {
    env_or("ACTOR_CATEGORICAL_VALUE", CENTRAL_CONFIG.mcts.categorical_value)
}
fn default_pb_c_base() -> f32 {
    env_or("ACTOR_PB_C_BASE", CENTRAL_CONFIG.mcts.pb_c_base as f32)
}
fn default_pb_c_init() -> f32 {
    env_or("ACTOR_PB_C_INIT", CENTRAL_CONFIG.mcts.pb_c_init as f32)
}
fn default_buffer_size() -> usize {
    env_or("ACTOR_BUFFER_SIZE", CENTRAL_CONFIG.buffer.buffer_size)
}
fn default_priority_replay() -> bool {
    env_or("ACTOR_PRIORITY_REPLAY", CENTRAL_CONFIG.buffer.priority_replay)
}
fn default_priority_alpha() -> f32 {
    env_or("ACTOR_PRIORITY_ALPHA", CENTRAL_CONFIG.buffer.priority_alpha as f32)
}
fn default_initial_priority_beta() -> f32 {
    env_or(
        "ACTOR_INITIAL_PRIORITY_BETA",
        CENTRAL_CONFIG.buffer.initial_priority_beta as f32,
    )
}
fn default_final_priority_beta() -> f32 {
    env_or(
        "ACTOR_FINAL_PRIORITY_BETA",
        CENTRAL_CONFIG.buffer.final_priority_beta as f32,
    )
}
fn default_max_total_frames() -> u64 {
    env_or("ACTOR_MAX_TOTAL_FRAMES", CENTRAL_CONFIG.buffer.max_total_frames)
}
fn default_rollout_depth() -> usize {
    env_or("ACTOR_ROLLOUT_DEPTH", CENTRAL_CONFIG.buffer.rollout_depth)
}
fn default_reward_depth() -> usize {
    env_or("ACTOR_REWARD_DEPTH", CENTRAL_CONFIG.buffer.reward_depth)
}
fn default_off_policy_correction() -> bool {
    env_or(
        "ACTOR_OFF_POLICY_CORRECTION",
        CENTRAL_CONFIG.buffer.off_policy_correction,
    )
}
fn default_tau() -> f32 {
    env_or("ACTOR_TAU", CENTRAL_CONFIG.buffer.tau as f32)
}
fn default_total_training_steps() -> u64 {
    env_or(
        "ACTOR_TOTAL_TRAINING_STEPS",
        CENTRAL_CONFIG.buffer.total_training_steps,
    )
}
fn default_batch_size() -> usize {
    env_or("ACTOR_BATCH_SIZE", CENTRAL_CONFIG.buffer.batch_size)
}
fn default_load_buffer() -> bool {
    env_or("ACTOR_LOAD_BUFFER", CENTRAL_CONFIG.buffer.load_buffer)
}
fn default_max_frames() -> u32 {
    env_or("ACTOR_MAX_FRAMES", CENTRAL_CONFIG.actor.max_frames)
}
fn default_max_games() -> i64 {
    env_or("ACTOR_MAX_GAMES", CENTRAL_CONFIG.actor.max_games)
}
fn default_temp1() -> u64 {
    env_or("ACTOR_TEMP1", CENTRAL_CONFIG.actor.temp1)
}
fn default_temp2() -> u64 {
    env_or("ACTOR_TEMP2", CENTRAL_CONFIG.actor.temp2)
}
fn default_log_interval() -> u32 {
    env_or("ACTOR_LOG_INTERVAL", CENTRAL_CONFIG.actor.log_interval)
}
fn default_stats_interval_secs() -> u64 {
    env_or(
        "ACTOR_STATS_INTERVAL_SECS",
        CENTRAL_CONFIG.actor.stats_interval_secs,
    )
}
fn default_reanalyse() -> bool {
    env_or("ACTOR_REANALYSE", CENTRAL_CONFIG.reanalyse.enabled)
}
fn default_reanalyse_min_games() -> u64 {
    env_or("ACTOR_REANALYSE_MIN_GAMES", CENTRAL_CONFIG.reanalyse.min_games)
}
fn default_reanalyse_idle_secs() -> u64 {
    env_or("ACTOR_REANALYSE_IDLE_SECS", CENTRAL_CONFIG.reanalyse.idle_secs)
}
fn default_latent_size() -> usize {
    env_or("ACTOR_LATENT_SIZE", CENTRAL_CONFIG.model.latent_size)
}
fn default_hidden_size() -> usize {
    env_or("ACTOR_HIDDEN_SIZE", CENTRAL_CONFIG.model.lstm_hidden_size)
}
fn default_seed() -> u64 {
    env_or("ACTOR_SEED", CENTRAL_CONFIG.model.seed)
}
fn default_batch_interval_ms() -> u64 {
    env_or("ACTOR_BATCH_INTERVAL_MS", 100)
}
fn default_players() -> usize {
    env_or("ACTOR_PLAYERS", 1)
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "actor")]
#[command(about = "MuZero actor - self-play, reanalysis and replay sampling")]
#[command(
    long_about = "Runs self-play games with MCTS over a learned model, stores them in a
prioritized replay buffer, reanalyses stale games with the latest model and
samples training batches.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Environment to play (e.g., counter)
    #[arg(long, default_value_t = default_env_name())]
    pub env_name: String,

    /// Data directory for the buffer snapshot and run stats
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Number of MCTS simulations per decision
    #[arg(long, default_value_t = default_n_simulations())]
    pub n_simulations: u32,

    /// Dirichlet concentration of the root exploration noise
    #[arg(long, default_value_t = default_root_dirichlet_alpha())]
    pub root_dirichlet_alpha: f32,

    /// Fraction of the root prior replaced by noise (0 disables noise)
    #[arg(long, default_value_t = default_explore_frac())]
    pub explore_frac: f32,

    #[arg(long, default_value_t = default_discount())]
    pub discount: f32,

    /// Half width of the value and reward supports
    #[arg(long, default_value_t = default_support_width())]
    pub support_width: usize,

    /// Recurrent dynamics predicting a value prefix
    #[arg(long, default_value_t = default_value_prefix(), action = ArgAction::Set)]
    pub value_prefix: bool,

    /// Categorical (support) value head instead of a scalar one
    #[arg(long, default_value_t = default_categorical_value(), action = ArgAction::Set)]
    pub categorical_value: bool,

    #[arg(long, default_value_t = default_pb_c_base())]
    pub pb_c_base: f32,

    #[arg(long, default_value_t = default_pb_c_init())]
    pub pb_c_init: f32,

    /// Maximum number of episodes kept in the replay buffer
    #[arg(long, default_value_t = default_buffer_size())]
    pub buffer_size: usize,

    /// Sample steps by priority instead of uniformly
    #[arg(long, default_value_t = default_priority_replay(), action = ArgAction::Set)]
    pub priority_replay: bool,

    #[arg(long, default_value_t = default_priority_alpha())]
    pub priority_alpha: f32,

    #[arg(long, default_value_t = default_initial_priority_beta())]
    pub initial_priority_beta: f32,

    #[arg(long, default_value_t = default_final_priority_beta())]
    pub final_priority_beta: f32,

    /// Frames over which beta is annealed to its final value
    #[arg(long, default_value_t = default_max_total_frames())]
    pub max_total_frames: u64,

    /// Positions per training window
    #[arg(long, default_value_t = default_rollout_depth())]
    pub rollout_depth: usize,

    /// n of the n-step value targets
    #[arg(long, default_value_t = default_reward_depth())]
    pub reward_depth: usize,

    /// Shorten the n-step horizon of older samples
    #[arg(long, default_value_t = default_off_policy_correction(), action = ArgAction::Set)]
    pub off_policy_correction: bool,

    #[arg(long, default_value_t = default_tau())]
    pub tau: f32,

    #[arg(long, default_value_t = default_total_training_steps())]
    pub total_training_steps: u64,

    /// Samples per training batch
    #[arg(long, default_value_t = default_batch_size())]
    pub batch_size: usize,

    /// Pause between sampled batches in milliseconds
    #[arg(long, default_value_t = default_batch_interval_ms())]
    pub batch_interval_ms: u64,

    /// Restore the replay buffer snapshot at startup
    #[arg(long, default_value_t = default_load_buffer(), action = ArgAction::Set)]
    pub load_buffer: bool,

    /// Maximum frames per game
    #[arg(long, default_value_t = default_max_frames())]
    pub max_frames: u32,

    /// Maximum games to play (-1 for unlimited)
    #[arg(long, default_value_t = default_max_games(), allow_hyphen_values = true)]
    pub max_games: i64,

    /// Play at temperature 1 until this many total frames
    #[arg(long, default_value_t = default_temp1())]
    pub temp1: u64,

    /// Play at temperature 0.5 until this many total frames, then greedily
    #[arg(long, default_value_t = default_temp2())]
    pub temp2: u64,

    /// Log a game summary every N games (0 to disable)
    #[arg(long, default_value_t = default_log_interval())]
    pub log_interval: u32,

    /// Interval between run stats writes in seconds
    #[arg(long, default_value_t = default_stats_interval_secs())]
    pub stats_interval_secs: u64,

    /// Run the reanalysis task
    #[arg(long, default_value_t = default_reanalyse(), action = ArgAction::Set)]
    pub reanalyse: bool,

    /// Games played before reanalysis starts
    #[arg(long, default_value_t = default_reanalyse_min_games())]
    pub reanalyse_min_games: u64,

    /// Sleep when no episode is stale enough to reanalyse
    #[arg(long, default_value_t = default_reanalyse_idle_secs())]
    pub reanalyse_idle_secs: u64,

    /// Latent size of the reference model
    #[arg(long, default_value_t = default_latent_size())]
    pub latent_size: usize,

    /// Recurrent state size of the reference model
    #[arg(long, default_value_t = default_hidden_size())]
    pub hidden_size: usize,

    /// Seed for the reference model weights and the task RNGs
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Number of concurrent player tasks
    #[arg(long, default_value_t = default_players())]
    pub players: usize,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.env_name.is_empty() {
            return Err(anyhow!("env_name cannot be empty"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        if self.n_simulations == 0 {
            return Err(anyhow!("n_simulations must be greater than 0"));
        }

        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(anyhow!("discount must be in (0, 1], got {}", self.discount));
        }

        if !(0.0..=1.0).contains(&self.explore_frac) {
            return Err(anyhow!(
                "explore_frac must be in [0, 1], got {}",
                self.explore_frac
            ));
        }

        if self.explore_frac > 0.0 && self.root_dirichlet_alpha <= 0.0 {
            return Err(anyhow!("root_dirichlet_alpha must be positive"));
        }

        for (name, size) in [
            ("buffer_size", self.buffer_size),
            ("batch_size", self.batch_size),
            ("rollout_depth", self.rollout_depth),
            ("reward_depth", self.reward_depth),
            ("latent_size", self.latent_size),
            ("players", self.players),
        ] {
            if size == 0 {
                return Err(anyhow!("{} must be greater than 0", name));
            }
        }

        if self.value_prefix && self.hidden_size == 0 {
            return Err(anyhow!("hidden_size must be greater than 0 with value_prefix"));
        }

        if self.max_frames == 0 {
            return Err(anyhow!("max_frames must be greater than 0"));
        }

        if self.priority_alpha < 0.0 {
            return Err(anyhow!("priority_alpha must be non-negative"));
        }

        for (name, beta) in [
            ("initial_priority_beta", self.initial_priority_beta),
            ("final_priority_beta", self.final_priority_beta),
        ] {
            if !(0.0..=1.0).contains(&beta) {
                return Err(anyhow!("{} must be in [0, 1], got {}", name, beta));
            }
        }

        if self.off_policy_correction && self.tau <= 0.0 {
            return Err(anyhow!("tau must be positive with off_policy_correction"));
        }

        if self.temp1 > self.temp2 {
            return Err(anyhow!(
                "temp1 ({}) must not exceed temp2 ({})",
                self.temp1,
                self.temp2
            ));
        }

        if self.stats_interval_secs == 0 {
            return Err(anyhow!("stats_interval_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Search settings for self-play (root noise as configured).
    pub fn mcts_config(&self) -> MctsConfig {
        MctsConfig {
            n_simulations: self.n_simulations,
            root_dirichlet_alpha: self.root_dirichlet_alpha,
            explore_frac: self.explore_frac,
            discount: self.discount,
            pb_c_init: self.pb_c_init,
            pb_c_base: self.pb_c_base,
            ..MctsConfig::default()
        }
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            capacity: self.buffer_size,
            priority_replay: self.priority_replay,
            priority_alpha: self.priority_alpha,
            initial_priority_beta: self.initial_priority_beta,
            final_priority_beta: self.final_priority_beta,
            max_total_frames: self.max_total_frames,
            rollout_depth: self.rollout_depth,
            reward_depth: self.reward_depth,
            off_policy_correction: self.off_policy_correction,
            tau: self.tau,
            total_training_steps: self.total_training_steps,
        }
    }

    pub fn model_settings(&self, observation_size: usize) -> ModelSettings {
        ModelSettings {
            observation_size,
            latent_size: self.latent_size,
            hidden_size: self.hidden_size,
            support_width: self.support_width,
            value_prefix: self.value_prefix,
            categorical_value: self.categorical_value,
            seed: self.seed,
        }
    }

    /// Play temperature for a game starting at `total_frames`.
    pub fn temperature(&self, total_frames: u64) -> f32 {
        if total_frames < self.temp1 {
            1.0
        } else if total_frames < self.temp2 {
            0.5
        } else {
            0.0
        }
    }

    /// Whether `games` completed games reach the configured limit.
    pub fn games_exhausted(&self, games: u64) -> bool {
        self.max_games >= 0 && games >= self.max_games as u64
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("replay_buffer.json")
    }

    /// Directory polled for `latest.json` model weights.
    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("models")
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn reanalyse_idle(&self) -> Duration {
        Duration::from_secs(self.reanalyse_idle_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}
