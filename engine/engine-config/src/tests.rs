//! Tests for the configuration module.

use super::*;

#[test]
fn test_default_config() {
    let config = CentralConfig::default();
    assert_eq!(config.common.env_name, "counter");
    assert_eq!(config.common.data_dir, "./data");
    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.actor.max_games, -1);
    assert_eq!(config.actor.max_frames, 1000);
    assert_eq!(config.mcts.n_simulations, 50);
    assert!(config.reanalyse.enabled);
}

#[test]
fn test_mcts_defaults() {
    let config = CentralConfig::default();
    assert!((config.mcts.root_dirichlet_alpha - 0.25).abs() < f64::EPSILON);
    assert!((config.mcts.explore_frac - 0.25).abs() < f64::EPSILON);
    assert!((config.mcts.discount - 0.997).abs() < f64::EPSILON);
    assert!((config.mcts.pb_c_base - 19652.0).abs() < f64::EPSILON);
    assert!((config.mcts.pb_c_init - 1.25).abs() < f64::EPSILON);
    assert_eq!(config.mcts.support_width, 10);
    assert!(!config.mcts.value_prefix);
    assert!(config.mcts.categorical_value);
}

#[test]
fn test_buffer_defaults() {
    let config = CentralConfig::default();
    assert_eq!(config.buffer.buffer_size, 1000);
    assert!(config.buffer.priority_replay);
    assert!((config.buffer.priority_alpha - 1.0).abs() < f64::EPSILON);
    assert!((config.buffer.initial_priority_beta - 0.4).abs() < f64::EPSILON);
    assert!((config.buffer.final_priority_beta - 1.0).abs() < f64::EPSILON);
    assert_eq!(config.buffer.rollout_depth, 5);
    assert_eq!(config.buffer.reward_depth, 5);
    assert!(!config.buffer.off_policy_correction);
    assert_eq!(config.buffer.batch_size, 128);
    assert!(!config.buffer.load_buffer);
}

#[test]
fn test_muzero_env_overrides() {
    std::env::set_var("MUZERO_COMMON_ENV_NAME", "pendulum");
    std::env::set_var("MUZERO_ACTOR_MAX_GAMES", "7");
    std::env::set_var("MUZERO_BUFFER_TAU", "0.5");
    std::env::set_var("MUZERO_MCTS_VALUE_PREFIX", "true");

    let config = load_config();
    assert_eq!(config.common.env_name, "pendulum");
    assert_eq!(config.actor.max_games, 7);
    assert!((config.buffer.tau - 0.5).abs() < f64::EPSILON);
    assert!(config.mcts.value_prefix);

    std::env::remove_var("MUZERO_COMMON_ENV_NAME");
    std::env::remove_var("MUZERO_ACTOR_MAX_GAMES");
    std::env::remove_var("MUZERO_BUFFER_TAU");
    std::env::remove_var("MUZERO_MCTS_VALUE_PREFIX");
}

#[test]
fn test_unparseable_env_override_is_ignored() {
    std::env::set_var("MUZERO_MODEL_LATENT_SIZE", "not-a-number");

    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.model.latent_size, 16);

    std::env::remove_var("MUZERO_MODEL_LATENT_SIZE");
}

#[test]
fn test_parse_config_toml() {
    let toml_content = r#"
[common]
env_name = "pendulum"
data_dir = "/custom/data"

[actor]
max_games = 100
temp1 = 10

[buffer]
buffer_size = 64
off_policy_correction = true
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.common.env_name, "pendulum");
    assert_eq!(config.common.data_dir, "/custom/data");
    assert_eq!(config.actor.max_games, 100);
    assert_eq!(config.actor.temp1, 10);
    assert_eq!(config.buffer.buffer_size, 64);
    assert!(config.buffer.off_policy_correction);
}

#[test]
fn test_partial_config() {
    let toml_content = r#"
[mcts]
n_simulations = 200
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.mcts.n_simulations, 200);
    assert!((config.mcts.discount - 0.997).abs() < f64::EPSILON); // Default
    assert_eq!(config.common.data_dir, "./data"); // Default
    assert_eq!(config.reanalyse.min_games, 2); // Default
}

#[test]
fn test_load_from_missing_path_uses_defaults() {
    let config = load_from_path(std::path::Path::new("/nonexistent/muzero/config.toml"));
    assert_eq!(config.buffer.buffer_size, 1000);
}

#[test]
fn test_load_from_malformed_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[mcts\nn_simulations = ").unwrap();

    let config = load_from_path(&path);
    assert_eq!(config.model.seed, 0);
}

#[test]
fn test_config_clone() {
    let config = CentralConfig::default();
    let cloned = config.clone();
    assert_eq!(config.common.env_name, cloned.common.env_name);
    assert_eq!(config.buffer.batch_size, cloned.buffer.batch_size);
}
