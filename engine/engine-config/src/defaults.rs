//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file is embedded at compile time so that a binary started
//! without any config.toml still has a complete configuration.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    mcts: MctsDefaults,
    buffer: BufferDefaults,
    actor: ActorDefaults,
    reanalyse: ReanalyseDefaults,
    model: ModelDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    env_name: String,
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct MctsDefaults {
    n_simulations: u32,
    root_dirichlet_alpha: f64,
    explore_frac: f64,
    discount: f64,
    support_width: usize,
    value_prefix: bool,
    categorical_value: bool,
    pb_c_base: f64,
    pb_c_init: f64,
}

#[derive(Debug, Deserialize)]
struct BufferDefaults {
    buffer_size: usize,
    priority_replay: bool,
    priority_alpha: f64,
    initial_priority_beta: f64,
    final_priority_beta: f64,
    max_total_frames: u64,
    rollout_depth: usize,
    reward_depth: usize,
    off_policy_correction: bool,
    tau: f64,
    total_training_steps: u64,
    batch_size: usize,
    load_buffer: bool,
}

#[derive(Debug, Deserialize)]
struct ActorDefaults {
    max_frames: u32,
    max_games: i64,
    temp1: u64,
    temp2: u64,
    log_interval: u32,
    stats_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ReanalyseDefaults {
    enabled: bool,
    min_games: u64,
    idle_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ModelDefaults {
    latent_size: usize,
    lstm_hidden_size: usize,
    seed: u64,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}
pub fn env_name() -> &'static str {
    &DEFAULTS.common.env_name
}
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// MCTS
pub fn n_simulations() -> u32 {
    DEFAULTS.mcts.n_simulations
}
pub fn root_dirichlet_alpha() -> f64 {
    DEFAULTS.mcts.root_dirichlet_alpha
}
pub fn explore_frac() -> f64 {
    DEFAULTS.mcts.explore_frac
}
pub fn discount() -> f64 {
    DEFAULTS.mcts.discount
}
pub fn support_width() -> usize {
    DEFAULTS.mcts.support_width
}
pub fn value_prefix() -> bool {
    DEFAULTS.mcts.value_prefix
}
pub fn categorical_value() -> bool {
    DEFAULTS.mcts.categorical_value
}
pub fn pb_c_base() -> f64 {
    DEFAULTS.mcts.pb_c_base
}
pub fn pb_c_init() -> f64 {
    DEFAULTS.mcts.pb_c_init
}

// Buffer
pub fn buffer_size() -> usize {
    DEFAULTS.buffer.buffer_size
}
pub fn priority_replay() -> bool {
    DEFAULTS.buffer.priority_replay
}
pub fn priority_alpha() -> f64 {
    DEFAULTS.buffer.priority_alpha
}
pub fn initial_priority_beta() -> f64 {
    DEFAULTS.buffer.initial_priority_beta
}
pub fn final_priority_beta() -> f64 {
    DEFAULTS.buffer.final_priority_beta
}
pub fn max_total_frames() -> u64 {
    DEFAULTS.buffer.max_total_frames
}
pub fn rollout_depth() -> usize {
    DEFAULTS.buffer.rollout_depth
}
pub fn reward_depth() -> usize {
    DEFAULTS.buffer.reward_depth
}
pub fn off_policy_correction() -> bool {
    DEFAULTS.buffer.off_policy_correction
}
pub fn tau() -> f64 {
    DEFAULTS.buffer.tau
}
pub fn total_training_steps() -> u64 {
    DEFAULTS.buffer.total_training_steps
}
pub fn batch_size() -> usize {
    DEFAULTS.buffer.batch_size
}
pub fn load_buffer() -> bool {
    DEFAULTS.buffer.load_buffer
}

// Actor
pub fn max_frames() -> u32 {
    DEFAULTS.actor.max_frames
}
pub fn max_games() -> i64 {
    DEFAULTS.actor.max_games
}
pub fn temp1() -> u64 {
    DEFAULTS.actor.temp1
}
pub fn temp2() -> u64 {
    DEFAULTS.actor.temp2
}
pub fn log_interval() -> u32 {
    DEFAULTS.actor.log_interval
}
pub fn stats_interval_secs() -> u64 {
    DEFAULTS.actor.stats_interval_secs
}

// Reanalyse
pub fn reanalyse_enabled() -> bool {
    DEFAULTS.reanalyse.enabled
}
pub fn reanalyse_min_games() -> u64 {
    DEFAULTS.reanalyse.min_games
}
pub fn reanalyse_idle_secs() -> u64 {
    DEFAULTS.reanalyse.idle_secs
}

// Model
pub fn latent_size() -> usize {
    DEFAULTS.model.latent_size
}
pub fn lstm_hidden_size() -> usize {
    DEFAULTS.model.lstm_hidden_size
}
pub fn seed() -> u64 {
    DEFAULTS.model.seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        // Just accessing these will verify the TOML parses correctly
        assert_eq!(data_dir(), "./data");
        assert_eq!(env_name(), "counter");
        assert_eq!(log_level(), "info");
    }

    #[test]
    fn test_mcts_defaults() {
        assert_eq!(n_simulations(), 50);
        assert!((pb_c_init() - 1.25).abs() < f64::EPSILON);
        assert!((pb_c_base() - 19652.0).abs() < f64::EPSILON);
        assert_eq!(support_width(), 10);
        assert!(!value_prefix());
        assert!(categorical_value());
    }

    #[test]
    fn test_buffer_defaults() {
        assert_eq!(buffer_size(), 1000);
        assert!(priority_replay());
        assert_eq!(rollout_depth(), 5);
        assert_eq!(reward_depth(), 5);
        assert!(!off_policy_correction());
        assert!(!load_buffer());
    }

    #[test]
    fn test_actor_defaults() {
        assert_eq!(max_games(), -1);
        assert!(temp1() < temp2());
        assert!(reanalyse_enabled());
        assert_eq!(reanalyse_min_games(), 2);
    }
}
