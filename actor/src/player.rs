//! Self-play task.
//!
//! Each game searches from every observation, plays the action drawn from
//! the root visit counts at the scheduled temperature, and records the step.
//! Finished games get their priorities and are pushed to the shared buffer.

use anyhow::{anyhow, Result};
use mcts::{search, ActionSpace, MctsConfig, MinMaxStats, Model};
use rand_chacha::ChaCha20Rng;
use replay::{EpisodeRecord, SharedReplayBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::env::Environment;
use crate::model_snapshot::ModelHandle;
use crate::stats::{GameTotals, RunStats};

/// Outcome of one played game.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub episode_id: u64,
    pub frames: u32,
    pub score: f32,
    pub temperature: f32,
    pub value_mean: f32,
    pub value_std: f32,
    pub secs_per_move: f64,
    pub totals: GameTotals,
}

pub struct Player<M: Model> {
    id: usize,
    config: Config,
    mcts_config: MctsConfig,
    env: Box<dyn Environment>,
    space: ActionSpace,
    model: ModelHandle<M>,
    buffer: SharedReplayBuffer,
    stats: Arc<RunStats>,
    /// Persists across the searches of every game this player runs.
    minmax: MinMaxStats,
    rng: ChaCha20Rng,
    shutdown: Arc<AtomicBool>,
}

impl<M: Model> Player<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        config: Config,
        env: Box<dyn Environment>,
        model: ModelHandle<M>,
        buffer: SharedReplayBuffer,
        stats: Arc<RunStats>,
        rng: ChaCha20Rng,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let space = env.action_space();
        let mcts_config = config.mcts_config();
        Self {
            id,
            config,
            mcts_config,
            env,
            space,
            model,
            buffer,
            stats,
            minmax: MinMaxStats::new(),
            rng,
            shutdown,
        }
    }

    /// Play games until the game limit is reached or shutdown is requested.
    pub fn run(&mut self) -> Result<()> {
        info!(player = self.id, "Player starting");

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!(player = self.id, "Shutdown signal received, stopping player");
                break;
            }

            if self.config.games_exhausted(self.stats.games()) {
                info!(
                    player = self.id,
                    "Reached maximum games ({}), stopping", self.config.max_games
                );
                break;
            }

            match self.play_game() {
                Ok(summary) => {
                    let games = summary.totals.games;
                    if self.config.log_interval > 0
                        && games % self.config.log_interval as u64 == 0
                    {
                        info!(
                            player = self.id,
                            game = games,
                            episode_id = summary.episode_id,
                            frames = summary.frames,
                            total_frames = summary.totals.frames,
                            score = summary.score,
                            temperature = summary.temperature,
                            value_mean = format!("{:.2}", summary.value_mean),
                            value_std = format!("{:.2}", summary.value_std),
                            secs_per_move = format!("{:.3}", summary.secs_per_move),
                            "Game finished"
                        );
                    }
                }
                Err(e) => {
                    // Continue with next game rather than stopping
                    error!(player = self.id, "Game failed: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Play one full game and push it to the buffer.
    pub fn play_game(&mut self) -> Result<GameSummary> {
        self.model.refresh()?;

        let start_frames = self.stats.frames();
        let temperature = self.config.temperature(start_frames);
        let mut record = EpisodeRecord::new(&self.space, self.config.discount, self.stats.games());

        let game_start = Instant::now();
        let mut observation = self.env.reset();
        let mut frames = 0u32;
        let mut score = 0.0f32;
        let mut values = Vec::new();
        let mut search_us = 0u64;

        while frames < self.config.max_frames {
            let result = search(
                self.model.model(),
                &observation,
                &mut self.minmax,
                &self.space,
                self.mcts_config,
                &mut self.rng,
            )?;
            search_us += result.stats.elapsed_us;

            let ordinal = result.tree.pick_game_action(temperature, &mut self.rng);
            let action = self.space.action(ordinal).clone();
            let step = self.env.step(&action)?;

            let over = step.is_over();
            values.push(result.tree.root_value());
            score += step.reward;
            frames += 1;

            let searched = std::mem::replace(&mut observation, step.observation);
            record.add_step(searched, action, step.reward, &result.tree, &self.space);

            if over {
                break;
            }
        }

        if frames == 0 {
            return Err(anyhow!("game ended before any move was played"));
        }

        record.add_priorities(self.config.reward_depth, false);
        let episode_id = {
            let mut buffer = self
                .buffer
                .write()
                .map_err(|e| anyhow!("Failed to acquire buffer write lock: {}", e))?;
            buffer.save_game(record)?
        };

        let totals = self.stats.record_game(frames as u64, score as f64);
        self.stats.record_searches(frames as u64, search_us);

        let (value_mean, value_std) = mean_std(&values);
        let secs_per_move = game_start.elapsed().as_secs_f64() / frames as f64;

        debug!(
            player = self.id,
            episode_id,
            frames,
            score,
            model_version = self.model.version(),
            "Game stored"
        );

        Ok(GameSummary {
            episode_id,
            frames,
            score,
            temperature,
            value_mean,
            value_std,
            secs_per_move,
            totals,
        })
    }
}

/// Population mean and standard deviation (0 for an empty slice).
fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}
