//! MCTS search implementation.
//!
//! Implements the MuZero planning loop over a learned model:
//! 1. Representation + prediction at the root, with optional Dirichlet noise
//! 2. Selection: descend with the UCB action score until an unexpanded action
//! 3. Expansion: one dynamics + prediction call creates the new child
//! 4. Backpropagation: discounted returns are folded into every node on the path

use std::time::Instant;

use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::trace;

use crate::action::ActionSpace;
use crate::config::MctsConfig;
use crate::minmax::MinMaxStats;
use crate::model::{softmax, Model, ModelError, Prediction, ValueOutput};
use crate::node::{MctsNode, NodeId};
use crate::support::decode_with_epsilon;
use crate::tree::MctsTree;

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),

    #[error("Empty action space")]
    NoActions,

    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),
}

/// Counters collected over one search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub simulations: u32,
    /// Number of model calls (represent, predict and dynamics).
    pub model_calls: u32,
    pub max_depth: u32,
    pub elapsed_us: u64,
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult<L, H> {
    /// Fully searched tree; its root carries the visit counts.
    pub tree: MctsTree<L, H>,
    pub stats: SearchStats,
}

/// MCTS search over a model.
pub struct MctsSearch<'a, M: Model> {
    model: &'a M,
    space: &'a ActionSpace,
    config: MctsConfig,
    stats: SearchStats,
}

impl<'a, M: Model> MctsSearch<'a, M> {
    pub fn new(model: &'a M, space: &'a ActionSpace, config: MctsConfig) -> Result<Self, SearchError> {
        if space.is_empty() {
            return Err(SearchError::NoActions);
        }
        Ok(Self {
            model,
            space,
            config,
            stats: SearchStats::default(),
        })
    }

    /// Run the configured number of simulations from an observation.
    ///
    /// `minmax` persists across the searches of a game and is widened in place.
    pub fn run(
        &mut self,
        observation: &[f32],
        minmax: &mut MinMaxStats,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult<M::Latent, M::Hidden>, SearchError> {
        let start = Instant::now();
        self.stats = SearchStats::default();

        let latent = self.model.represent(observation)?;
        let prediction = self.model.predict(&latent)?;
        self.stats.model_calls += 2;
        let (mut policy, value) = self.decode_prediction(prediction)?;

        if self.config.has_root_noise() {
            self.add_dirichlet_noise(&mut policy, rng);
        }

        let root = MctsNode::new_root(
            latent,
            self.model.initial_hidden(),
            value,
            policy,
            self.space.len(),
        );
        let mut tree = MctsTree::new(root);

        for _ in 0..self.config.n_simulations {
            self.simulate(&mut tree, minmax, rng)?;
        }

        self.stats.elapsed_us = start.elapsed().as_micros() as u64;
        Ok(SearchResult {
            tree,
            stats: self.stats,
        })
    }

    /// Run a single simulation (select -> expand -> backpropagate).
    fn simulate(
        &mut self,
        tree: &mut MctsTree<M::Latent, M::Hidden>,
        minmax: &mut MinMaxStats,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), SearchError> {
        let mut path = vec![tree.root()];
        let mut current = tree.root();

        // Descend until the selected action has no child yet.
        let action = loop {
            let action = tree.select_action(current, minmax, self.space, &self.config, rng);
            match tree.get(current).children[action] {
                Some(child) => {
                    path.push(child);
                    current = child;
                }
                None => break action,
            }
        };

        let (child, value) = self.expand(tree, current, action)?;
        path.push(child);
        tree.backpropagate(&path, value, self.config.discount, minmax);

        self.stats.simulations += 1;
        let depth = (path.len() - 1) as u32;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        trace!(
            leaf = child.0,
            path_len = path.len(),
            value = value,
            "MCTS simulation complete"
        );

        Ok(())
    }

    /// Create the child of `parent` for `action` with a single dynamics and
    /// prediction call. Returns the new node and its predicted value.
    fn expand(
        &mut self,
        tree: &mut MctsTree<M::Latent, M::Hidden>,
        parent: NodeId,
        action: usize,
    ) -> Result<(NodeId, f32), SearchError> {
        let node = tree.get(parent);
        let step = self
            .model
            .dynamics(&node.latent, self.space.action(action), node.hidden.as_ref())?;
        let prediction = self.model.predict(&step.latent)?;
        self.stats.model_calls += 2;

        // Value-prefix models emit a prefix here; it is stored as the reward.
        let reward = decode_with_epsilon(&softmax(&step.reward_logits), self.config.support_epsilon);
        let (policy, value) = self.decode_prediction(prediction)?;

        let child = MctsNode::new_child(
            parent,
            action,
            step.latent,
            step.hidden,
            reward,
            value,
            policy,
            self.space.len(),
        );
        Ok((tree.insert_child(parent, action, child), value))
    }

    /// Softmax the policy logits per dimension and decode the value.
    fn decode_prediction(&self, prediction: Prediction) -> Result<(Vec<Vec<f32>>, f32), SearchError> {
        if prediction.policy_logits.len() != self.space.dims() {
            return Err(SearchError::InvalidPrediction(format!(
                "expected {} policy dimensions, got {}",
                self.space.dims(),
                prediction.policy_logits.len()
            )));
        }
        if let Some(bad) = prediction
            .policy_logits
            .iter()
            .find(|logits| logits.len() != self.space.values_per_dim())
        {
            return Err(SearchError::InvalidPrediction(format!(
                "expected {} logits per dimension, got {}",
                self.space.values_per_dim(),
                bad.len()
            )));
        }

        let policy = prediction.policy_logits.iter().map(|l| softmax(l)).collect();
        let value = match prediction.value {
            ValueOutput::Categorical(logits) => {
                decode_with_epsilon(&softmax(&logits), self.config.support_epsilon)
            }
            ValueOutput::Scalar(v) => v,
        };
        Ok((policy, value))
    }

    /// Mix independent Dirichlet noise into each dimension of the root policy.
    fn add_dirichlet_noise(&self, policy: &mut [Vec<f32>], rng: &mut ChaCha20Rng) {
        let frac = self.config.explore_frac;
        for dim_policy in policy.iter_mut() {
            let noise = dirichlet_noise(dim_policy.len(), self.config.root_dirichlet_alpha, rng);
            for (p, n) in dim_policy.iter_mut().zip(noise) {
                *p = (1.0 - frac) * *p + frac * n;
            }
        }
    }

    /// Counters of the most recent run.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }
}

/// Generate Dirichlet-distributed noise using Gamma variates.
pub fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    use rand_distr::{Distribution, Gamma};

    let gamma = match Gamma::new(alpha as f64, 1.0) {
        Ok(gamma) => gamma,
        Err(_) => return vec![1.0 / n as f32; n],
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }

    samples
}

/// Convenience function to run a single MCTS search.
pub fn search<M: Model>(
    model: &M,
    observation: &[f32],
    minmax: &mut MinMaxStats,
    space: &ActionSpace,
    config: MctsConfig,
    rng: &mut ChaCha20Rng,
) -> Result<SearchResult<M::Latent, M::Hidden>, SearchError> {
    let mut search = MctsSearch::new(model, space, config)?;
    search.run(observation, minmax, rng)
}
