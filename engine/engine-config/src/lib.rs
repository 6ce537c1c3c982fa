//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! across all Rust components (actor, search, replay).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`MUZERO_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! MUZERO_<SECTION>_<KEY>=value
//!
//! Examples:
//!     MUZERO_COMMON_ENV_NAME=counter
//!     MUZERO_COMMON_DATA_DIR=/data
//!     MUZERO_MCTS_N_SIMULATIONS=100
//!     MUZERO_BUFFER_OFF_POLICY_CORRECTION=true
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, CONFIG_ENV_VAR, CONFIG_SEARCH_PATHS,
};
pub use structs::*;

#[cfg(test)]
mod tests;
