//! Per-episode trajectory store.
//!
//! An [`EpisodeRecord`] keeps parallel per-step sequences: the observation a
//! search ran on, the action played, the reward received, the root visit
//! distribution and the root value. Training targets are built from these
//! with n-step bootstrapping.

use mcts::{Action, ActionSpace, MctsTree};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower bound on a step priority, so that no step becomes unsampleable.
pub const PRIORITY_FLOOR: f32 = 1e-4;

/// One full episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Observation each decision was searched from.
    pub observations: Vec<Vec<f32>>,
    pub actions: Vec<Action>,
    /// Reward received after playing the action at the same step.
    pub rewards: Vec<f32>,
    /// Normalized root visit counts, one vector per action dimension.
    pub search_policies: Vec<Vec<Vec<f32>>>,
    /// Root average value of each search (overwritten by reanalysis).
    pub values: Vec<f32>,
    /// Step priorities; empty until `add_priorities` runs.
    pub priorities: Vec<f32>,
    /// Global game count when this record was created or last reanalysed.
    pub last_analysed: u64,
    pub discount: f32,
    action_dims: usize,
    values_per_dim: usize,
}

/// Training window starting at one step of an episode.
///
/// Every vector has `rollout_depth` entries; positions at or beyond `depth`
/// lie past the end of the episode and are zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub observations: Vec<Vec<f32>>,
    /// Action components per position.
    pub actions: Vec<Vec<usize>>,
    pub target_values: Vec<f32>,
    pub target_rewards: Vec<f32>,
    pub target_policies: Vec<Vec<Vec<f32>>>,
    /// Number of positions backed by real steps.
    pub depth: usize,
}

impl EpisodeRecord {
    /// Empty record for an episode played in `space`.
    pub fn new(space: &ActionSpace, discount: f32, last_analysed: u64) -> Self {
        Self {
            observations: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            search_policies: Vec::new(),
            values: Vec::new(),
            priorities: Vec::new(),
            last_analysed,
            discount,
            action_dims: space.dims(),
            values_per_dim: space.values_per_dim(),
        }
    }

    /// Append one decision: the searched observation, the action played, the
    /// reward it produced and the search tree the action came from.
    pub fn add_step<L, H>(
        &mut self,
        observation: Vec<f32>,
        action: Action,
        reward: f32,
        tree: &MctsTree<L, H>,
        space: &ActionSpace,
    ) {
        self.observations.push(observation);
        self.actions.push(action);
        self.rewards.push(reward);
        self.search_policies.push(tree.visit_policy(space));
        self.values.push(tree.root_value());
    }

    /// Number of recorded steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn action_dims(&self) -> usize {
        self.action_dims
    }

    #[inline]
    pub fn values_per_dim(&self) -> usize {
        self.values_per_dim
    }

    /// Length of each stored observation (0 for an empty record).
    pub fn observation_size(&self) -> usize {
        self.observations.first().map_or(0, Vec::len)
    }

    /// Sum of rewards over the episode.
    pub fn score(&self) -> f32 {
        self.rewards.iter().sum()
    }

    /// n-step bootstrapped value target for one step.
    ///
    /// `discount^n * value[i + n] + sum_{j < n} discount^j * reward[i + j]`,
    /// where rewards past the end are 0 and values past the end repeat the
    /// last stored value.
    pub fn n_step_value(&self, step: usize, n_steps: usize) -> f32 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }

        let bootstrap = step + n_steps;
        let bootstrap_value = if bootstrap < len {
            self.values[bootstrap]
        } else {
            self.values[len - 1]
        };

        let mut target = self.discount.powi(n_steps as i32) * bootstrap_value;
        let mut discount = 1.0f32;
        for j in 0..n_steps {
            let Some(&reward) = self.rewards.get(step + j) else {
                break;
            };
            target += discount * reward;
            discount *= self.discount;
        }
        target
    }

    /// Build the training window of `rollout_depth` positions starting at
    /// `step`, with `reward_depth`-step value targets.
    ///
    /// Position `k` holds the observation, action and search policy of step
    /// `step + k`. `target_rewards[k]` is the reward that led into that step,
    /// so `target_rewards[0]` is always 0.
    pub fn make_target(&self, step: usize, reward_depth: usize, rollout_depth: usize) -> Target {
        let len = self.len();
        let depth = len.saturating_sub(step).min(rollout_depth);
        let observation_size = self.observation_size();

        let mut target = Target {
            observations: Vec::with_capacity(rollout_depth),
            actions: Vec::with_capacity(rollout_depth),
            target_values: Vec::with_capacity(rollout_depth),
            target_rewards: Vec::with_capacity(rollout_depth),
            target_policies: Vec::with_capacity(rollout_depth),
            depth,
        };

        for k in 0..rollout_depth {
            let ndx = step + k;
            if k < depth {
                target.observations.push(self.observations[ndx].clone());
                target.actions.push(self.actions[ndx].components().to_vec());
                target.target_values.push(self.n_step_value(ndx, reward_depth));
                target
                    .target_rewards
                    .push(if k == 0 { 0.0 } else { self.rewards[ndx - 1] });
                target.target_policies.push(self.search_policies[ndx].clone());
            } else {
                target.observations.push(vec![0.0; observation_size]);
                target.actions.push(vec![0; self.action_dims]);
                target.target_values.push(0.0);
                target.target_rewards.push(0.0);
                target
                    .target_policies
                    .push(vec![vec![0.0; self.values_per_dim]; self.action_dims]);
            }
        }

        target
    }

    /// Recompute every step priority as `|value - n_step_value|`, floored at
    /// [`PRIORITY_FLOOR`]. Replaces any previous priorities.
    pub fn add_priorities(&mut self, n_steps: usize, reanalysing: bool) {
        self.priorities = (0..self.len())
            .map(|i| (self.values[i] - self.n_step_value(i, n_steps)).abs().max(PRIORITY_FLOOR))
            .collect();

        debug!(
            steps = self.len(),
            n_steps,
            reanalysing,
            "Episode priorities computed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Record with hand-filled sequences: observations `[i]`, discrete actions
    /// `i % 2` and a policy of `[1, 0]` at every step.
    fn record(rewards: &[f32], values: &[f32], discount: f32) -> EpisodeRecord {
        let space = ActionSpace::discrete(2);
        let mut rec = EpisodeRecord::new(&space, discount, 0);
        for (i, (&r, &v)) in rewards.iter().zip(values).enumerate() {
            rec.observations.push(vec![i as f32]);
            rec.actions.push(Action::Discrete(i % 2));
            rec.rewards.push(r);
            rec.search_policies.push(vec![vec![1.0, 0.0]]);
            rec.values.push(v);
        }
        rec
    }

    #[test]
    fn test_n_step_value_inside_episode() {
        let rec = record(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0], 0.5);
        // 0.5^2 * 30 + 1 + 0.5 * 2
        assert!((rec.n_step_value(0, 2) - 9.5).abs() < 1e-6);
    }

    #[test]
    fn test_n_step_value_clipped_at_episode_end() {
        let rec = record(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0], 0.5);
        // bootstrap index 5 is past the end: last value 30, rewards 3 then zeros
        let expected = 0.5f32.powi(3) * 30.0 + 3.0;
        assert!((rec.n_step_value(2, 3) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_make_target_full_window() {
        let rec = record(&[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0], 1.0);
        let target = rec.make_target(1, 1, 2);

        assert_eq!(target.depth, 2);
        assert_eq!(target.observations, vec![vec![1.0], vec![2.0]]);
        assert_eq!(target.actions, vec![vec![1], vec![0]]);
        // reward + next value with discount 1
        assert_eq!(target.target_values, vec![2.0 + 30.0, 3.0 + 40.0]);
        assert_eq!(target.target_rewards, vec![0.0, 2.0]);
        assert_eq!(target.target_policies.len(), 2);
    }

    #[test]
    fn test_make_target_pads_past_episode_end() {
        let rec = record(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0], 1.0);
        let target = rec.make_target(2, 1, 4);

        assert_eq!(target.depth, 1);
        assert_eq!(target.observations.len(), 4);
        assert_eq!(target.observations[1], vec![0.0]);
        assert_eq!(target.actions[3], vec![0]);
        assert_eq!(target.target_values[1..], [0.0, 0.0, 0.0]);
        assert_eq!(target.target_rewards, vec![0.0; 4]);
        assert_eq!(target.target_policies[2], vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_add_priorities_overwrites() {
        let mut rec = record(&[1.0, 1.0, 1.0], &[0.0, 0.0, 0.0], 1.0);
        rec.add_priorities(1, false);
        assert_eq!(rec.priorities.len(), 3);
        // |0 - (1 + 0)| at every step
        for p in &rec.priorities {
            assert!((p - 1.0).abs() < 1e-6);
        }

        rec.values = vec![1.0, 1.0, 1.0];
        rec.add_priorities(1, true);
        assert_eq!(rec.priorities.len(), 3);
        // |1 - (1 + 1)|
        assert!((rec.priorities[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_priorities_are_floored() {
        let mut rec = record(&[0.0, 0.0], &[0.0, 0.0], 1.0);
        rec.add_priorities(1, false);
        assert!(rec.priorities.iter().all(|&p| p >= PRIORITY_FLOOR));
    }

    #[test]
    fn test_add_step_from_search_tree() {
        use mcts::{search, ConstantModel, MctsConfig, MinMaxStats, SupportCodec};
        use rand::SeedableRng;
        use rand_chacha::ChaCha20Rng;

        let space = ActionSpace::discrete(2);
        let model = ConstantModel::new(1, 2, 1.0, 0.0, SupportCodec::with_half_width(10));
        let mut minmax = MinMaxStats::new();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let result = search(&model, &[0.0; 4], &mut minmax, &space, MctsConfig::for_testing(), &mut rng).unwrap();

        let mut rec = EpisodeRecord::new(&space, 0.997, 4);
        rec.add_step(vec![0.0; 4], Action::Discrete(1), 2.0, &result.tree, &space);

        assert_eq!(rec.len(), 1);
        assert_eq!(rec.observation_size(), 4);
        assert!((rec.values[0] - result.tree.root_value()).abs() < 1e-6);
        let total: f32 = rec.search_policies[0][0].iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!((rec.score() - 2.0).abs() < 1e-6);
        assert_eq!(rec.last_analysed, 4);
    }
}
