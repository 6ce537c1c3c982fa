//! Monte Carlo Tree Search (MCTS) over a learned model, MuZero style.
//!
//! The search never touches a real environment. It plans inside the latent
//! space of a [`Model`] that exposes three inference functions:
//! `represent` (observation to latent), `predict` (latent to policy and value)
//! and `dynamics` (latent and action to next latent and reward).
//!
//! # Overview
//!
//! Each simulation consists of three phases:
//!
//! 1. **Selection**: Descend from the root scoring every action with the
//!    MuZero UCB formula, using values normalized by a running [`MinMaxStats`]
//! 2. **Expansion**: The first time an action is selected, one dynamics and
//!    one prediction call create its child node
//! 3. **Backpropagation**: The child's predicted value is discounted back up
//!    the path, adding each node's reward along the way
//!
//! Values and rewards come out of the model as categorical supports; the
//! [`SupportCodec`] converts between those and scalars.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcts::{search, ActionSpace, ConstantModel, MctsConfig, MinMaxStats, SupportCodec};
//! use rand_chacha::ChaCha20Rng;
//! use rand::SeedableRng;
//!
//! let space = ActionSpace::discrete(2);
//! let model = ConstantModel::new(1, 2, 0.0, 1.0, SupportCodec::with_half_width(300));
//! let mut minmax = MinMaxStats::new();
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//!
//! let result = search(&model, &observation, &mut minmax, &space, MctsConfig::for_training(), &mut rng)?;
//! let ordinal = result.tree.pick_game_action(1.0, &mut rng);
//! let action = space.action(ordinal);
//! let policy_target = result.tree.visit_policy(&space);
//! ```
//!
//! # Configuration
//!
//! The [`MctsConfig`] struct controls search behavior:
//!
//! - `n_simulations`: Number of simulations per search (default: 50)
//! - `pb_c_init` / `pb_c_base`: Exploration constants (1.25 / 19652)
//! - `root_dirichlet_alpha` / `explore_frac`: Root noise (0.25 / 0.25)
//! - `discount`: Per-step discount used when backing values up

pub mod action;
pub mod config;
pub mod minmax;
pub mod model;
pub mod node;
pub mod search;
pub mod support;
pub mod tree;

// Re-export main types
pub use action::{Action, ActionSpace};
pub use config::MctsConfig;
pub use minmax::MinMaxStats;
pub use model::{softmax, ConstantModel, Dynamics, Model, ModelError, Prediction, ValueOutput};
pub use node::{MctsNode, NodeId};
pub use search::{dirichlet_noise, search, MctsSearch, SearchError, SearchResult, SearchStats};
pub use support::{decode_with_epsilon, SupportCodec, DEFAULT_EPSILON};
pub use tree::{MctsTree, TreeStats};
