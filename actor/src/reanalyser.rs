//! Reanalysis task.
//!
//! Picks stored games with probability proportional to how long ago they
//! were last analysed, reruns the search over every stored observation with
//! the latest model and writes the refreshed root values and priorities
//! back. Games evicted in the meantime are skipped.

use anyhow::{anyhow, Result};
use mcts::{search, ActionSpace, MctsConfig, MinMaxStats, Model};
use rand_chacha::ChaCha20Rng;
use replay::SharedReplayBuffer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::actor::idle;
use crate::config::Config;
use crate::env::Environment;
use crate::model_snapshot::ModelHandle;
use crate::stats::RunStats;

/// Pause while waiting for the buffer to fill.
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Result of one reanalysis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReanalyseOutcome {
    /// Not enough games have been played yet.
    Waiting,
    /// No stored game is stale.
    Idle,
    Reanalysed { episode_id: u64, steps: usize },
    /// The sampled game was evicted before its values were written back.
    Evicted { episode_id: u64 },
}

pub struct Reanalyser<M: Model> {
    config: Config,
    mcts_config: MctsConfig,
    space: ActionSpace,
    model: ModelHandle<M>,
    buffer: SharedReplayBuffer,
    stats: Arc<RunStats>,
    minmax: MinMaxStats,
    rng: ChaCha20Rng,
    shutdown: Arc<AtomicBool>,
}

impl<M: Model> Reanalyser<M> {
    pub fn new(
        config: Config,
        env: &dyn Environment,
        model: ModelHandle<M>,
        buffer: SharedReplayBuffer,
        stats: Arc<RunStats>,
        rng: ChaCha20Rng,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let mcts_config = config.mcts_config();
        Self {
            config,
            mcts_config,
            space: env.action_space(),
            model,
            buffer,
            stats,
            minmax: MinMaxStats::new(),
            rng,
            shutdown,
        }
    }

    /// Reanalyse until shutdown is requested.
    pub fn run(&mut self) -> Result<()> {
        info!("Reanalyser starting");

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.reanalyse_once() {
                Ok(ReanalyseOutcome::Waiting) => idle(&self.shutdown, WAIT_INTERVAL),
                Ok(ReanalyseOutcome::Idle) => {
                    debug!("No stale games to reanalyse");
                    idle(&self.shutdown, self.config.reanalyse_idle());
                }
                Ok(ReanalyseOutcome::Reanalysed { episode_id, steps }) => {
                    let total = self.stats.record_reanalysis();
                    info!(episode_id, steps, total, "Reanalysed game");
                }
                Ok(ReanalyseOutcome::Evicted { episode_id }) => {
                    debug!(episode_id, "Game evicted during reanalysis");
                }
                Err(e) => {
                    warn!("Reanalysis failed: {}", e);
                    idle(&self.shutdown, self.config.reanalyse_idle());
                }
            }
        }

        info!("Reanalyser stopped");
        Ok(())
    }

    /// Reanalyse at most one stored game.
    pub fn reanalyse_once(&mut self) -> Result<ReanalyseOutcome> {
        let games = self.stats.games();

        // Copy the observations out so that no lock is held while searching.
        let (episode_id, observations) = {
            let buffer = self
                .buffer
                .read()
                .map_err(|e| anyhow!("Failed to acquire buffer read lock: {}", e))?;
            if buffer.is_empty() || games < self.config.reanalyse_min_games {
                return Ok(ReanalyseOutcome::Waiting);
            }
            let Some(id) = buffer.sample_reanalyse_id(games, &mut self.rng) else {
                return Ok(ReanalyseOutcome::Idle);
            };
            match buffer.get_episode(id) {
                Some(episode) => (id, episode.observations.clone()),
                None => return Ok(ReanalyseOutcome::Evicted { episode_id: id }),
            }
        };

        self.model.refresh()?;

        let mut values = Vec::with_capacity(observations.len());
        let mut search_us = 0u64;
        for observation in &observations {
            let result = search(
                self.model.model(),
                observation,
                &mut self.minmax,
                &self.space,
                self.mcts_config,
                &mut self.rng,
            )?;
            search_us += result.stats.elapsed_us;
            values.push(result.tree.root_value());
        }
        self.stats
            .record_searches(observations.len() as u64, search_us);

        let mut buffer = self
            .buffer
            .write()
            .map_err(|e| anyhow!("Failed to acquire buffer write lock: {}", e))?;
        if !buffer.update_vals(episode_id, values, games)? {
            return Ok(ReanalyseOutcome::Evicted { episode_id });
        }
        buffer.add_priorities(episode_id, true);

        Ok(ReanalyseOutcome::Reanalysed {
            episode_id,
            steps: observations.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use crate::env::CounterEnv;
    use crate::model_snapshot::ModelSnapshot;
    use crate::reference_model::LinearModel;
    use mcts::Action;
    use rand::SeedableRng;
    use replay::{EpisodeRecord, ReplayBuffer};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        reanalyser: Reanalyser<LinearModel>,
        buffer: SharedReplayBuffer,
        stats: Arc<RunStats>,
        _dir: TempDir,
    }

    fn fixture(config: Config) -> Fixture {
        let dir = tempdir().unwrap();
        let env = CounterEnv::new();
        let model = LinearModel::new(config.model_settings(4), &env.action_space());
        let handle = ModelHandle::new(Arc::new(ModelSnapshot::new(model))).unwrap();
        let buffer = replay::shared(ReplayBuffer::new(config.buffer_config()));
        let stats = Arc::new(RunStats::new(dir.path(), "counter"));
        let reanalyser = Reanalyser::new(
            config,
            &env,
            handle,
            Arc::clone(&buffer),
            Arc::clone(&stats),
            ChaCha20Rng::seed_from_u64(4),
            Arc::new(AtomicBool::new(false)),
        );
        Fixture {
            reanalyser,
            buffer,
            stats,
            _dir: dir,
        }
    }

    /// Stored game of `len` steps with zero values, analysed at game `analysed`.
    fn stored_game(buffer: &SharedReplayBuffer, len: usize, analysed: u64) -> u64 {
        let space = ActionSpace::discrete(2);
        let mut record = EpisodeRecord::new(&space, 0.997, analysed);
        for i in 0..len {
            record.observations.push(vec![i as f32, 1.0, 1.0, 1.0]);
            record.actions.push(Action::Discrete(0));
            record.rewards.push(1.0);
            record.search_policies.push(vec![vec![0.5, 0.5]]);
            record.values.push(0.0);
        }
        record.add_priorities(5, false);
        buffer.write().unwrap().save_game(record).unwrap()
    }

    #[test]
    fn test_waits_for_enough_games() {
        let mut fx = fixture(base_config());
        assert_eq!(fx.reanalyser.reanalyse_once().unwrap(), ReanalyseOutcome::Waiting);

        stored_game(&fx.buffer, 3, 0);
        fx.stats.record_game(3, 0.0);
        // one game played, two required
        assert_eq!(fx.reanalyser.reanalyse_once().unwrap(), ReanalyseOutcome::Waiting);
    }

    #[test]
    fn test_idle_when_nothing_is_stale() {
        let mut fx = fixture(base_config());
        stored_game(&fx.buffer, 3, 2);
        fx.stats.record_game(3, 0.0);
        fx.stats.record_game(3, 0.0);

        assert_eq!(fx.reanalyser.reanalyse_once().unwrap(), ReanalyseOutcome::Idle);
    }

    #[test]
    fn test_reanalysis_updates_values_and_staleness() {
        let mut fx = fixture(base_config());
        let id = stored_game(&fx.buffer, 4, 0);
        fx.stats.record_game(4, 0.0);
        fx.stats.record_game(4, 0.0);

        let before = fx.buffer.read().unwrap().get_episode(id).unwrap().clone();
        let outcome = fx.reanalyser.reanalyse_once().unwrap();
        assert_eq!(
            outcome,
            ReanalyseOutcome::Reanalysed {
                episode_id: id,
                steps: 4
            }
        );

        let buffer = fx.buffer.read().unwrap();
        let after = buffer.get_episode(id).unwrap();
        assert_eq!(after.last_analysed, 2);
        assert_eq!(after.values.len(), 4);
        assert_ne!(after.values, before.values);
        assert_eq!(after.priorities.len(), 4);
        assert_eq!(buffer.priorities().len(), buffer.total_steps());

        // Freshly analysed, so nothing is stale any more.
        drop(buffer);
        assert_eq!(fx.reanalyser.reanalyse_once().unwrap(), ReanalyseOutcome::Idle);
    }
}
