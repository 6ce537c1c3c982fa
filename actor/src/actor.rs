//! Actor orchestration.
//!
//! Owns the shared replay buffer and run stats, starts the player,
//! reanalyser and batch consumer tasks on blocking threads, and writes run
//! stats periodically until every player has finished. On exit the buffer
//! snapshot and final stats are persisted.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mcts::ActionSpace;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use replay::{ReplayBuffer, SharedReplayBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::env::make_env;
use crate::model_snapshot::{ModelHandle, ModelSnapshot};
use crate::model_watcher::ModelWatcher;
use crate::player::Player;
use crate::reanalyser::Reanalyser;
use crate::reference_model::LinearModel;
use crate::stats::RunStats;
use crate::trainer::BatchConsumer;

/// Longest single sleep inside [`idle`].
const IDLE_SLICE: Duration = Duration::from_millis(100);

/// How often the model file is checked for changes.
const MODEL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Sleep for `duration`, waking early once `shutdown` is set.
pub(crate) fn idle(shutdown: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(IDLE_SLICE));
    }
}

fn log_task_result(task: &str, result: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{} failed: {}", task, e),
        Err(e) => error!("{} task panicked: {}", task, e),
    }
}

pub struct Actor {
    config: Config,
    space: ActionSpace,
    observation_size: usize,
    buffer: SharedReplayBuffer,
    stats: Arc<RunStats>,
    shutdown: Arc<AtomicBool>,
}

impl Actor {
    pub fn new(config: Config) -> Result<Self> {
        let env = make_env(&config.env_name)?;
        let space = env.action_space();
        let observation_size = env.observation_size();
        info!(
            env_name = %config.env_name,
            actions = space.len(),
            observation_size,
            "Environment ready"
        );

        let snapshot_path = config.snapshot_path();
        let buffer = if config.load_buffer && snapshot_path.exists() {
            ReplayBuffer::load_snapshot(config.buffer_config(), &snapshot_path)?
        } else {
            if config.load_buffer {
                info!(
                    path = %snapshot_path.display(),
                    "No replay buffer snapshot found, starting empty"
                );
            }
            ReplayBuffer::new(config.buffer_config())
        };

        let stats = Arc::new(RunStats::new(&config.data_dir, &config.env_name));

        Ok(Self {
            config,
            space,
            observation_size,
            buffer: replay::shared(buffer),
            stats,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn run(&self) -> Result<()> {
        let model = LinearModel::new(
            self.config.model_settings(self.observation_size),
            &self.space,
        );
        info!(
            latent_size = model.settings().latent_size,
            value_prefix = model.settings().value_prefix,
            seed = model.settings().seed,
            "Reference model initialized"
        );
        let snapshot = Arc::new(ModelSnapshot::new(model));

        let mut watcher = ModelWatcher::new(
            self.config.model_dir(),
            self.observation_size,
            self.space.clone(),
        );
        info!(path = %watcher.model_path().display(), "Watching model file");
        self.reload_model(&mut watcher, &snapshot);

        info!(
            players = self.config.players,
            max_games = self.config.max_games,
            n_simulations = self.config.n_simulations,
            reanalyse = self.config.reanalyse,
            "Actor starting"
        );

        let mut player_handles = Vec::with_capacity(self.config.players);
        for id in 0..self.config.players {
            let mut player = Player::new(
                id,
                self.config.clone(),
                make_env(&self.config.env_name)?,
                ModelHandle::new(Arc::clone(&snapshot))?,
                Arc::clone(&self.buffer),
                Arc::clone(&self.stats),
                ChaCha20Rng::seed_from_u64(self.config.seed.wrapping_add(id as u64 + 1)),
                Arc::clone(&self.shutdown),
            );
            player_handles.push(tokio::task::spawn_blocking(move || player.run()));
        }

        let mut background: Vec<(&str, JoinHandle<Result<()>>)> = Vec::new();

        if self.config.reanalyse {
            let env = make_env(&self.config.env_name)?;
            let mut reanalyser = Reanalyser::new(
                self.config.clone(),
                env.as_ref(),
                ModelHandle::new(Arc::clone(&snapshot))?,
                Arc::clone(&self.buffer),
                Arc::clone(&self.stats),
                ChaCha20Rng::seed_from_u64(self.config.seed.wrapping_add(0x5eed)),
                Arc::clone(&self.shutdown),
            );
            background.push((
                "Reanalyser",
                tokio::task::spawn_blocking(move || reanalyser.run()),
            ));
        }

        let mut consumer = BatchConsumer::new(
            self.config.batch_size,
            self.config.batch_interval(),
            self.config.log_interval,
            Arc::clone(&self.buffer),
            Arc::clone(&self.stats),
            ChaCha20Rng::seed_from_u64(self.config.seed.wrapping_add(0xba7c)),
            Arc::clone(&self.shutdown),
        );
        background.push((
            "Batch consumer",
            tokio::task::spawn_blocking(move || consumer.run()),
        ));

        // Progress bar only for bounded runs on a terminal
        let progress = if self.config.max_games > 0
            && std::io::IsTerminal::is_terminal(&std::io::stderr())
        {
            let pb = ProgressBar::new(self.config.max_games as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} games ({eta})")?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut players_done = tokio::spawn(async move {
            for handle in player_handles {
                log_task_result("Player", handle.await);
            }
        });

        let mut stats_timer = interval(self.config.stats_interval());
        let mut progress_timer = interval(Duration::from_millis(500));
        let mut model_timer = interval(MODEL_POLL_INTERVAL);

        loop {
            tokio::select! {
                result = &mut players_done => {
                    if let Err(e) = result {
                        error!("Player supervisor panicked: {}", e);
                    }
                    break;
                }
                _ = stats_timer.tick() => self.stats.write_stats(),
                _ = model_timer.tick() => self.reload_model(&mut watcher, &snapshot),
                _ = progress_timer.tick() => {
                    if let Some(ref pb) = progress {
                        pb.set_position(self.stats.games());
                    }
                }
            }
        }

        if let Some(pb) = progress {
            pb.set_position(self.stats.games());
            pb.finish_with_message("done");
        }

        // Players are done; stop the background tasks.
        self.shutdown.store(true, Ordering::Relaxed);
        for (task, handle) in background {
            log_task_result(task, handle.await);
        }

        self.persist();

        let snapshot = self.stats.snapshot();
        info!(
            games = snapshot.games_played,
            frames = snapshot.total_frames,
            batches = snapshot.batches_sampled,
            reanalysed = snapshot.episodes_reanalysed,
            mean_score = format!("{:.2}", snapshot.mean_score),
            "Actor stopped gracefully"
        );
        Ok(())
    }

    /// Publish the model file if it changed. Load failures keep the current model.
    fn reload_model(&self, watcher: &mut ModelWatcher, snapshot: &ModelSnapshot<LinearModel>) {
        match watcher.poll(snapshot) {
            Ok(Some(version)) => self.stats.record_model_version(version),
            Ok(None) => {}
            Err(e) => warn!("Failed to reload model: {}", e),
        }
    }

    /// Save the buffer snapshot and the final run stats.
    fn persist(&self) {
        let path = self.config.snapshot_path();
        match self.buffer.read() {
            Ok(buffer) => {
                if let Err(e) = buffer.save_snapshot(&path) {
                    warn!("Failed to save replay buffer to {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Failed to acquire buffer read lock: {}", e),
        }
        self.stats.write_stats();
        info!(
            snapshot = %path.display(),
            stats = %self.stats.stats_path().display(),
            "Run state persisted"
        );
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        info!("Shutdown signal set");
    }

    #[cfg(test)]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &SharedReplayBuffer {
        &self.buffer
    }
}
