//! MCTS configuration parameters.

use crate::support::DEFAULT_EPSILON;

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone, Copy)]
pub struct MctsConfig {
    /// Number of simulations to run per search.
    pub n_simulations: u32,

    /// Dirichlet concentration for root exploration noise.
    /// Set to 0.0 to disable noise (for evaluation/inference).
    pub root_dirichlet_alpha: f32,

    /// Fraction of the root prior that comes from Dirichlet noise.
    pub explore_frac: f32,

    /// Discount applied per step during backpropagation.
    pub discount: f32,

    /// Constant term of the exploration weight (c1 in MuZero, 1.25).
    pub pb_c_init: f32,

    /// Visit scale of the logarithmic exploration term (c2 in MuZero, 19652).
    pub pb_c_base: f32,

    /// Epsilon of the value/reward squashing transform.
    pub support_epsilon: f64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            n_simulations: 50,
            root_dirichlet_alpha: 0.25,
            explore_frac: 0.25,
            discount: 0.997,
            pb_c_init: 1.25,
            pb_c_base: 19652.0,
            support_epsilon: DEFAULT_EPSILON,
        }
    }
}

impl MctsConfig {
    /// Create config for self-play (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation (no root noise).
    pub fn for_evaluation() -> Self {
        Self {
            root_dirichlet_alpha: 0.0,
            explore_frac: 0.0,
            ..Self::default()
        }
    }

    /// Create a small, noise-free config for testing.
    pub fn for_testing() -> Self {
        Self {
            n_simulations: 10,
            root_dirichlet_alpha: 0.0,
            explore_frac: 0.0,
            ..Self::default()
        }
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.n_simulations = n;
        self
    }

    /// Builder pattern: set the discount.
    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    /// Builder pattern: set root Dirichlet noise.
    pub fn with_root_noise(mut self, alpha: f32, explore_frac: f32) -> Self {
        self.root_dirichlet_alpha = alpha;
        self.explore_frac = explore_frac;
        self
    }

    /// Whether root noise is applied.
    pub fn has_root_noise(&self) -> bool {
        self.root_dirichlet_alpha > 0.0 && self.explore_frac > 0.0
    }
}
