//! Bounded FIFO buffer of episode records with prioritized batch sampling.
//!
//! Steps of all stored episodes are addressed through a flat index into their
//! virtual concatenation. The derived state that makes this possible
//! (`game_starts`, `total_steps` and the normalized priority vector) is
//! recomputed by `update_stats` after every mutation. Callers must hold the
//! buffer exclusively while mutating it; see [`crate::SharedReplayBuffer`].

use std::collections::VecDeque;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, warn};

use crate::episode::EpisodeRecord;
use crate::error::ReplayError;

/// Replay buffer parameters.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum number of stored episodes.
    pub capacity: usize,
    pub priority_replay: bool,
    /// Exponent applied to raw priorities before normalization.
    pub priority_alpha: f32,
    pub initial_priority_beta: f32,
    pub final_priority_beta: f32,
    /// Frame count at which beta reaches its final value.
    pub max_total_frames: u64,
    /// Number of unrolled positions per sample.
    pub rollout_depth: usize,
    /// Bootstrap horizon of the value targets.
    pub reward_depth: usize,
    /// Shorten the bootstrap horizon for older samples.
    pub off_policy_correction: bool,
    pub tau: f32,
    pub total_training_steps: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            priority_replay: true,
            priority_alpha: 1.0,
            initial_priority_beta: 0.4,
            final_priority_beta: 1.0,
            max_total_frames: 100_000,
            rollout_depth: 5,
            reward_depth: 5,
            off_policy_correction: false,
            tau: 0.3,
            total_training_steps: 100_000,
        }
    }
}

/// A sampled training batch, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_size: usize,
    pub rollout_depth: usize,
    pub observation_size: usize,
    pub action_dims: usize,
    pub values_per_dim: usize,
    /// `[batch_size, rollout_depth, observation_size]`
    pub observations: Vec<f32>,
    /// `[batch_size, rollout_depth, action_dims]`
    pub actions: Vec<usize>,
    /// `[batch_size, rollout_depth]`
    pub target_values: Vec<f32>,
    /// `[batch_size, rollout_depth]`
    pub target_rewards: Vec<f32>,
    /// `[batch_size, rollout_depth, action_dims, values_per_dim]`
    pub target_policies: Vec<f32>,
    /// Importance-sampling weights, max-normalized (all 1 without priority replay).
    pub weights: Vec<f32>,
    /// Valid positions per sample.
    pub depths: Vec<usize>,
    /// Bootstrap horizon used per sample.
    pub reward_depths: Vec<usize>,
    /// Source episode of each sample.
    pub episode_ids: Vec<u64>,
    /// Flat step index of each sample.
    pub indices: Vec<usize>,
}

/// Bounded FIFO list of episode records.
#[derive(Debug)]
pub struct ReplayBuffer {
    config: BufferConfig,
    episodes: VecDeque<EpisodeRecord>,
    /// Stable identifiers, parallel to `episodes`.
    episode_ids: VecDeque<u64>,
    next_id: u64,

    // Derived state, rebuilt by `update_stats`.
    game_starts: Vec<usize>,
    total_steps: usize,
    priorities: Vec<f64>,
}

impl ReplayBuffer {
    /// # Panics
    /// If `config.capacity` is 0.
    pub fn new(config: BufferConfig) -> Self {
        assert!(config.capacity > 0, "replay buffer capacity must be positive");
        Self {
            config,
            episodes: VecDeque::new(),
            episode_ids: VecDeque::new(),
            next_id: 0,
            game_starts: Vec::new(),
            total_steps: 0,
            priorities: Vec::new(),
        }
    }

    /// Rebuild a buffer from stored episodes and their identifiers.
    ///
    /// Only the newest `capacity` episodes are kept.
    ///
    /// # Panics
    /// If `config.capacity` is 0.
    pub(crate) fn from_parts(
        config: BufferConfig,
        episodes: Vec<EpisodeRecord>,
        episode_ids: Vec<u64>,
    ) -> Result<Self, ReplayError> {
        assert!(config.capacity > 0, "replay buffer capacity must be positive");
        if episodes.len() != episode_ids.len() {
            return Err(ReplayError::LengthMismatch {
                expected: episodes.len(),
                actual: episode_ids.len(),
            });
        }

        let mut episodes: VecDeque<_> = episodes.into();
        let mut episode_ids: VecDeque<_> = episode_ids.into();
        while episodes.len() > config.capacity {
            episodes.pop_front();
            episode_ids.pop_front();
        }

        let next_id = episode_ids.iter().max().map_or(0, |&id| id + 1);
        let mut buffer = Self {
            config,
            episodes,
            episode_ids,
            next_id,
            game_starts: Vec::new(),
            total_steps: 0,
            priorities: Vec::new(),
        };
        buffer.update_stats();
        Ok(buffer)
    }

    #[inline]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Number of stored episodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Number of steps across all stored episodes.
    #[inline]
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Identifiers of stored episodes, oldest first.
    pub fn episode_ids(&self) -> Vec<u64> {
        self.episode_ids.iter().copied().collect()
    }

    /// Offset of each episode in the flat step index.
    #[inline]
    pub fn game_starts(&self) -> &[usize] {
        &self.game_starts
    }

    /// Normalized sampling probability of each flat step (empty without
    /// priority replay).
    #[inline]
    pub fn priorities(&self) -> &[f64] {
        &self.priorities
    }

    pub(crate) fn episodes(&self) -> impl Iterator<Item = &EpisodeRecord> {
        self.episodes.iter()
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.episode_ids.iter().position(|&i| i == id)
    }

    /// Look up an episode by its stable identifier.
    pub fn get_episode(&self, id: u64) -> Option<&EpisodeRecord> {
        self.position(id).map(|pos| &self.episodes[pos])
    }

    /// Store a finished episode, evicting the oldest one when full.
    ///
    /// Records saved without priorities get them computed here. Returns the
    /// identifier assigned to the episode.
    pub fn save_game(&mut self, mut record: EpisodeRecord) -> Result<u64, ReplayError> {
        if record.is_empty() {
            return Err(ReplayError::EmptyEpisode);
        }
        if record.priorities.len() != record.len() {
            record.add_priorities(self.config.reward_depth, false);
        }

        while !self.episodes.is_empty() && self.episodes.len() >= self.config.capacity {
            self.episodes.pop_front();
            if let Some(evicted) = self.episode_ids.pop_front() {
                debug!(episode_id = evicted, "Evicted oldest episode");
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.episodes.push_back(record);
        self.episode_ids.push_back(id);
        self.update_stats();

        debug!(
            episode_id = id,
            episodes = self.episodes.len(),
            total_steps = self.total_steps,
            "Saved episode"
        );
        Ok(id)
    }

    /// Recompute `game_starts`, `total_steps` and the normalized priorities.
    fn update_stats(&mut self) {
        self.game_starts.clear();
        let mut total = 0;
        for episode in &self.episodes {
            self.game_starts.push(total);
            total += episode.len();
        }
        self.total_steps = total;

        self.priorities.clear();
        if self.config.priority_replay {
            let alpha = self.config.priority_alpha as f64;
            self.priorities.extend(
                self.episodes
                    .iter()
                    .flat_map(|e| e.priorities.iter())
                    .map(|&p| (p as f64).powf(alpha)),
            );
            let sum: f64 = self.priorities.iter().sum();
            if sum > 0.0 {
                for p in &mut self.priorities {
                    *p /= sum;
                }
            }
        }
    }

    /// Resolve a flat step index to `(episode position, step within episode)`.
    pub fn get_ndxs(&self, index: usize) -> Result<(usize, usize), ReplayError> {
        if index >= self.total_steps {
            return Err(ReplayError::IndexOutOfRange {
                index,
                total_steps: self.total_steps,
            });
        }
        // Last episode starting at or before `index`.
        let pos = self.game_starts.partition_point(|&start| start <= index) - 1;
        Ok((pos, index - self.game_starts[pos]))
    }

    /// Importance-sampling exponent, annealed linearly with the frame count
    /// and held at its final value past `max_total_frames`.
    pub fn priority_beta(&self, total_frames: u64) -> f32 {
        let progress = if self.config.max_total_frames == 0 {
            1.0
        } else {
            (total_frames as f64 / self.config.max_total_frames as f64).min(1.0)
        };
        let initial = self.config.initial_priority_beta;
        initial + progress as f32 * (self.config.final_priority_beta - initial)
    }

    /// Bootstrap horizon for a sample at flat `index`.
    ///
    /// With off-policy correction, the horizon shrinks by one for every
    /// `tau * total_training_steps` steps stored after the sample, down to 1.
    pub fn reward_depth_for(&self, index: usize) -> usize {
        let max_depth = self.config.reward_depth;
        if !self.config.off_policy_correction {
            return max_depth;
        }

        let scale = self.config.tau as f64 * self.config.total_training_steps as f64;
        if scale <= 0.0 {
            return max_depth;
        }
        let steps_ago = self.total_steps.saturating_sub(index) as f64;
        let depth = max_depth as f64 - (steps_ago / scale).floor();
        depth.clamp(1.0, max_depth.max(1) as f64) as usize
    }

    /// Sample `batch_size` training windows, with replacement.
    ///
    /// # Panics
    /// If priority replay is on and the priority vector does not cover every
    /// stored step.
    pub fn get_batch(
        &self,
        batch_size: usize,
        total_frames: u64,
        rng: &mut ChaCha20Rng,
    ) -> Result<Batch, ReplayError> {
        if self.total_steps == 0 {
            return Err(ReplayError::EmptyBuffer);
        }

        let prioritized = self.config.priority_replay;
        let indices: Vec<usize> = if prioritized {
            assert_eq!(
                self.priorities.len(),
                self.total_steps,
                "priority vector out of sync with stored steps"
            );
            let dist = WeightedIndex::new(&self.priorities)
                .map_err(|e| ReplayError::InvalidWeights(e.to_string()))?;
            (0..batch_size).map(|_| dist.sample(rng)).collect()
        } else {
            (0..batch_size)
                .map(|_| rng.gen_range(0..self.total_steps))
                .collect()
        };

        let rollout_depth = self.config.rollout_depth;
        let first = &self.episodes[0];
        let (action_dims, values_per_dim) = (first.action_dims(), first.values_per_dim());
        let observation_size = first.observation_size();

        let mut batch = Batch {
            batch_size,
            rollout_depth,
            observation_size,
            action_dims,
            values_per_dim,
            observations: Vec::with_capacity(batch_size * rollout_depth * observation_size),
            actions: Vec::with_capacity(batch_size * rollout_depth * action_dims),
            target_values: Vec::with_capacity(batch_size * rollout_depth),
            target_rewards: Vec::with_capacity(batch_size * rollout_depth),
            target_policies: Vec::with_capacity(
                batch_size * rollout_depth * action_dims * values_per_dim,
            ),
            weights: Vec::with_capacity(batch_size),
            depths: Vec::with_capacity(batch_size),
            reward_depths: Vec::with_capacity(batch_size),
            episode_ids: Vec::with_capacity(batch_size),
            indices: Vec::with_capacity(batch_size),
        };

        let beta = self.priority_beta(total_frames) as f64;
        let mut weights = Vec::with_capacity(batch_size);

        for index in indices {
            let (pos, step) = self.get_ndxs(index)?;
            let episode = &self.episodes[pos];
            if episode.observation_size() != observation_size {
                return Err(ReplayError::LengthMismatch {
                    expected: observation_size,
                    actual: episode.observation_size(),
                });
            }

            let reward_depth = self.reward_depth_for(index);
            let target = episode.make_target(step, reward_depth, rollout_depth);

            batch.observations.extend(target.observations.iter().flatten());
            batch.actions.extend(target.actions.iter().flatten());
            batch.target_values.extend(&target.target_values);
            batch.target_rewards.extend(&target.target_rewards);
            batch
                .target_policies
                .extend(target.target_policies.iter().flatten().flatten());
            batch.depths.push(target.depth);
            batch.reward_depths.push(reward_depth);
            batch.episode_ids.push(self.episode_ids[pos]);
            batch.indices.push(index);

            weights.push(if prioritized {
                (1.0 / self.priorities[index]).powf(beta)
            } else {
                1.0
            });
        }

        let max_weight = weights.iter().copied().fold(0.0f64, f64::max);
        batch.weights = weights
            .into_iter()
            .map(|w| if max_weight > 0.0 { (w / max_weight) as f32 } else { 1.0 })
            .collect();

        Ok(batch)
    }

    /// Overwrite the values of an episode after reanalysis.
    ///
    /// Returns `Ok(false)` and logs if the episode has been evicted.
    pub fn update_vals(&mut self, id: u64, values: Vec<f32>, total_games: u64) -> Result<bool, ReplayError> {
        let Some(pos) = self.position(id) else {
            warn!(episode_id = id, "No buffer item with this id, skipping value update");
            return Ok(false);
        };

        let episode = &mut self.episodes[pos];
        if values.len() != episode.len() {
            return Err(ReplayError::LengthMismatch {
                expected: episode.len(),
                actual: values.len(),
            });
        }
        episode.values = values;
        episode.last_analysed = total_games;
        Ok(true)
    }

    /// Recompute the priorities of an episode from its current values.
    ///
    /// Returns false and logs if the episode has been evicted.
    pub fn add_priorities(&mut self, id: u64, reanalysing: bool) -> bool {
        let Some(pos) = self.position(id) else {
            warn!(episode_id = id, "No buffer item with this id, skipping priorities");
            return false;
        };

        self.episodes[pos].add_priorities(self.config.reward_depth, reanalysing);
        self.update_stats();
        true
    }

    /// Reanalysis sampling distribution over episode positions, proportional
    /// to how many games ago each episode was last analysed.
    ///
    /// Empty if the buffer is empty or every episode is fresh.
    pub fn reanalyse_probabilities(&self, total_games: u64) -> Vec<f64> {
        let staleness: Vec<f64> = self
            .episodes
            .iter()
            .map(|e| total_games.saturating_sub(e.last_analysed) as f64)
            .collect();
        let sum: f64 = staleness.iter().sum();
        if sum > 0.0 {
            staleness.into_iter().map(|s| s / sum).collect()
        } else {
            Vec::new()
        }
    }

    /// Pick the identifier of an episode to reanalyse, favouring stale ones.
    pub fn sample_reanalyse_id(&self, total_games: u64, rng: &mut ChaCha20Rng) -> Option<u64> {
        let probabilities = self.reanalyse_probabilities(total_games);
        let dist = WeightedIndex::new(&probabilities).ok()?;
        Some(self.episode_ids[dist.sample(rng)])
    }
}
