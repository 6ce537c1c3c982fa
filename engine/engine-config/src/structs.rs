//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_env_name() -> String {
    defaults::env_name().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_n_simulations() -> u32 {
    defaults::n_simulations()
}
fn d_root_dirichlet_alpha() -> f64 {
    defaults::root_dirichlet_alpha()
}
fn d_explore_frac() -> f64 {
    defaults::explore_frac()
}
fn d_discount() -> f64 {
    defaults::discount()
}
fn d_support_width() -> usize {
    defaults::support_width()
}
fn d_value_prefix() -> bool {
    defaults::value_prefix()
}
fn d_categorical_value() -> bool {
    defaults::categorical_value()
}
fn d_pb_c_base() -> f64 {
    defaults::pb_c_base()
}
fn d_pb_c_init() -> f64 {
    defaults::pb_c_init()
}
fn d_buffer_size() -> usize {
    defaults::buffer_size()
}
fn d_priority_replay() -> bool {
    defaults::priority_replay()
}
fn d_priority_alpha() -> f64 {
    defaults::priority_alpha()
}
fn d_initial_priority_beta() -> f64 {
    defaults::initial_priority_beta()
}
fn d_final_priority_beta() -> f64 {
    defaults::final_priority_beta()
}
fn d_max_total_frames() -> u64 {
    defaults::max_total_frames()
}
fn d_rollout_depth() -> usize {
    defaults::rollout_depth()
}
fn d_reward_depth() -> usize {
    defaults::reward_depth()
}
fn d_off_policy_correction() -> bool {
    defaults::off_policy_correction()
}
fn d_tau() -> f64 {
    defaults::tau()
}
fn d_total_training_steps() -> u64 {
    defaults::total_training_steps()
}
fn d_batch_size() -> usize {
    defaults::batch_size()
}
fn d_load_buffer() -> bool {
    defaults::load_buffer()
}
fn d_max_frames() -> u32 {
    defaults::max_frames()
}
fn d_max_games() -> i64 {
    defaults::max_games()
}
fn d_temp1() -> u64 {
    defaults::temp1()
}
fn d_temp2() -> u64 {
    defaults::temp2()
}
fn d_log_interval() -> u32 {
    defaults::log_interval()
}
fn d_stats_interval_secs() -> u64 {
    defaults::stats_interval_secs()
}
fn d_reanalyse_enabled() -> bool {
    defaults::reanalyse_enabled()
}
fn d_reanalyse_min_games() -> u64 {
    defaults::reanalyse_min_games()
}
fn d_reanalyse_idle_secs() -> u64 {
    defaults::reanalyse_idle_secs()
}
fn d_latent_size() -> usize {
    defaults::latent_size()
}
fn d_lstm_hidden_size() -> usize {
    defaults::lstm_hidden_size()
}
fn d_seed() -> u64 {
    defaults::seed()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub reanalyse: ReanalyseConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_env_name")]
    pub env_name: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            env_name: defaults::env_name().into(),
            log_level: defaults::log_level().into(),
        }
    }
}

/// MCTS (Monte Carlo Tree Search) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_n_simulations")]
    pub n_simulations: u32,
    #[serde(default = "d_root_dirichlet_alpha")]
    pub root_dirichlet_alpha: f64,
    #[serde(default = "d_explore_frac")]
    pub explore_frac: f64,
    #[serde(default = "d_discount")]
    pub discount: f64,
    /// Half width of the value/reward support.
    #[serde(default = "d_support_width")]
    pub support_width: usize,
    /// Recurrent dynamics predicting a value prefix instead of a single-step reward.
    #[serde(default = "d_value_prefix")]
    pub value_prefix: bool,
    /// Value head outputs a support rather than a scalar.
    #[serde(default = "d_categorical_value")]
    pub categorical_value: bool,
    #[serde(default = "d_pb_c_base")]
    pub pb_c_base: f64,
    #[serde(default = "d_pb_c_init")]
    pub pb_c_init: f64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            n_simulations: defaults::n_simulations(),
            root_dirichlet_alpha: defaults::root_dirichlet_alpha(),
            explore_frac: defaults::explore_frac(),
            discount: defaults::discount(),
            support_width: defaults::support_width(),
            value_prefix: defaults::value_prefix(),
            categorical_value: defaults::categorical_value(),
            pb_c_base: defaults::pb_c_base(),
            pb_c_init: defaults::pb_c_init(),
        }
    }
}

/// Replay buffer configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum number of stored episodes.
    #[serde(default = "d_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "d_priority_replay")]
    pub priority_replay: bool,
    #[serde(default = "d_priority_alpha")]
    pub priority_alpha: f64,
    #[serde(default = "d_initial_priority_beta")]
    pub initial_priority_beta: f64,
    #[serde(default = "d_final_priority_beta")]
    pub final_priority_beta: f64,
    /// Frame count at which the importance-sampling beta reaches its final value.
    #[serde(default = "d_max_total_frames")]
    pub max_total_frames: u64,
    #[serde(default = "d_rollout_depth")]
    pub rollout_depth: usize,
    #[serde(default = "d_reward_depth")]
    pub reward_depth: usize,
    #[serde(default = "d_off_policy_correction")]
    pub off_policy_correction: bool,
    #[serde(default = "d_tau")]
    pub tau: f64,
    #[serde(default = "d_total_training_steps")]
    pub total_training_steps: u64,
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    /// Restore the buffer snapshot from `data_dir` at startup.
    #[serde(default = "d_load_buffer")]
    pub load_buffer: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: defaults::buffer_size(),
            priority_replay: defaults::priority_replay(),
            priority_alpha: defaults::priority_alpha(),
            initial_priority_beta: defaults::initial_priority_beta(),
            final_priority_beta: defaults::final_priority_beta(),
            max_total_frames: defaults::max_total_frames(),
            rollout_depth: defaults::rollout_depth(),
            reward_depth: defaults::reward_depth(),
            off_policy_correction: defaults::off_policy_correction(),
            tau: defaults::tau(),
            total_training_steps: defaults::total_training_steps(),
            batch_size: defaults::batch_size(),
            load_buffer: defaults::load_buffer(),
        }
    }
}

/// Actor (self-play) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActorConfig {
    #[serde(default = "d_max_frames")]
    pub max_frames: u32,
    /// Maximum games to play (-1 = unlimited).
    #[serde(default = "d_max_games")]
    pub max_games: i64,
    /// Play at temperature 1 until this many total frames.
    #[serde(default = "d_temp1")]
    pub temp1: u64,
    /// Play at temperature 0.5 until this many total frames, then 0.
    #[serde(default = "d_temp2")]
    pub temp2: u64,
    #[serde(default = "d_log_interval")]
    pub log_interval: u32,
    #[serde(default = "d_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_frames: defaults::max_frames(),
            max_games: defaults::max_games(),
            temp1: defaults::temp1(),
            temp2: defaults::temp2(),
            log_interval: defaults::log_interval(),
            stats_interval_secs: defaults::stats_interval_secs(),
        }
    }
}

/// Reanalysis configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReanalyseConfig {
    #[serde(default = "d_reanalyse_enabled")]
    pub enabled: bool,
    /// Total games played before reanalysis starts.
    #[serde(default = "d_reanalyse_min_games")]
    pub min_games: u64,
    /// Sleep when no episode is stale enough to reanalyse.
    #[serde(default = "d_reanalyse_idle_secs")]
    pub idle_secs: u64,
}

impl Default for ReanalyseConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::reanalyse_enabled(),
            min_games: defaults::reanalyse_min_games(),
            idle_secs: defaults::reanalyse_idle_secs(),
        }
    }
}

/// Reference model configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(default = "d_latent_size")]
    pub latent_size: usize,
    #[serde(default = "d_lstm_hidden_size")]
    pub lstm_hidden_size: usize,
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            latent_size: defaults::latent_size(),
            lstm_hidden_size: defaults::lstm_hidden_size(),
            seed: defaults::seed(),
        }
    }
}
