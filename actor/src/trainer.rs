//! Batch consumer.
//!
//! Pulls prioritized training batches from the shared buffer at a fixed
//! pace. The gradient step lives outside this binary; this task exercises
//! sampling under concurrent writes and reports batch statistics.

use anyhow::{anyhow, Result};
use rand_chacha::ChaCha20Rng;
use replay::{Batch, ReplayError, SharedReplayBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::actor::idle;
use crate::stats::RunStats;

/// Summary of one sampled batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub batch_number: u64,
    pub size: usize,
    pub mean_weight: f32,
    pub mean_depth: f32,
    pub mean_reward_depth: f32,
    pub mean_target_value: f32,
}

impl BatchSummary {
    fn from_batch(batch_number: u64, batch: &Batch) -> Self {
        let mean = |xs: &mut dyn Iterator<Item = f32>, n: usize| {
            if n == 0 {
                0.0
            } else {
                xs.sum::<f32>() / n as f32
            }
        };
        Self {
            batch_number,
            size: batch.batch_size,
            mean_weight: mean(&mut batch.weights.iter().copied(), batch.weights.len()),
            mean_depth: mean(&mut batch.depths.iter().map(|&d| d as f32), batch.depths.len()),
            mean_reward_depth: mean(
                &mut batch.reward_depths.iter().map(|&d| d as f32),
                batch.reward_depths.len(),
            ),
            mean_target_value: mean(
                &mut batch.target_values.iter().copied(),
                batch.target_values.len(),
            ),
        }
    }
}

pub struct BatchConsumer {
    batch_size: usize,
    interval: Duration,
    log_interval: u32,
    buffer: SharedReplayBuffer,
    stats: Arc<RunStats>,
    rng: ChaCha20Rng,
    shutdown: Arc<AtomicBool>,
}

impl BatchConsumer {
    pub fn new(
        batch_size: usize,
        interval: Duration,
        log_interval: u32,
        buffer: SharedReplayBuffer,
        stats: Arc<RunStats>,
        rng: ChaCha20Rng,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            batch_size,
            interval,
            log_interval,
            buffer,
            stats,
            rng,
            shutdown,
        }
    }

    /// Sample batches until shutdown is requested.
    pub fn run(&mut self) -> Result<()> {
        info!(batch_size = self.batch_size, "Batch consumer starting");

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.sample_once() {
                Ok(Some(summary)) => {
                    if self.log_interval > 0 && summary.batch_number % self.log_interval as u64 == 0 {
                        info!(
                            batch = summary.batch_number,
                            size = summary.size,
                            mean_weight = format!("{:.3}", summary.mean_weight),
                            mean_depth = format!("{:.2}", summary.mean_depth),
                            mean_reward_depth = format!("{:.2}", summary.mean_reward_depth),
                            mean_target_value = format!("{:.3}", summary.mean_target_value),
                            "Sampled batch"
                        );
                    }
                }
                Ok(None) => debug!("Buffer empty, waiting for games"),
                Err(e) => warn!("Batch sampling failed: {}", e),
            }
            idle(&self.shutdown, self.interval);
        }

        info!(batches = self.stats.batches(), "Batch consumer stopped");
        Ok(())
    }

    /// Sample one batch. `None` while the buffer is empty.
    pub fn sample_once(&mut self) -> Result<Option<BatchSummary>> {
        let total_frames = self.stats.frames();
        let batch = {
            let buffer = self
                .buffer
                .read()
                .map_err(|e| anyhow!("Failed to acquire buffer read lock: {}", e))?;
            match buffer.get_batch(self.batch_size, total_frames, &mut self.rng) {
                Ok(batch) => batch,
                Err(ReplayError::EmptyBuffer) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        };

        let batch_number = self.stats.record_batch();
        Ok(Some(BatchSummary::from_batch(batch_number, &batch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcts::{Action, ActionSpace};
    use rand::SeedableRng;
    use replay::{BufferConfig, EpisodeRecord, ReplayBuffer};
    use tempfile::tempdir;

    fn consumer(buffer: SharedReplayBuffer, stats: Arc<RunStats>) -> BatchConsumer {
        BatchConsumer::new(
            8,
            Duration::from_millis(1),
            1,
            buffer,
            stats,
            ChaCha20Rng::seed_from_u64(2),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn game(len: usize) -> EpisodeRecord {
        let space = ActionSpace::discrete(2);
        let mut record = EpisodeRecord::new(&space, 1.0, 0);
        for i in 0..len {
            record.observations.push(vec![i as f32; 3]);
            record.actions.push(Action::Discrete(1));
            record.rewards.push(1.0);
            record.search_policies.push(vec![vec![0.0, 1.0]]);
            record.values.push(0.5);
        }
        record
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let dir = tempdir().unwrap();
        let stats = Arc::new(RunStats::new(dir.path(), "counter"));
        let buffer = replay::shared(ReplayBuffer::new(BufferConfig::default()));
        let mut consumer = consumer(buffer, Arc::clone(&stats));

        assert_eq!(consumer.sample_once().unwrap(), None);
        assert_eq!(stats.batches(), 0);
    }

    #[test]
    fn test_sample_once_counts_batches() {
        let dir = tempdir().unwrap();
        let stats = Arc::new(RunStats::new(dir.path(), "counter"));
        let buffer = replay::shared(ReplayBuffer::new(BufferConfig::default()));
        buffer.write().unwrap().save_game(game(10)).unwrap();
        let mut consumer = consumer(Arc::clone(&buffer), Arc::clone(&stats));

        let first = consumer.sample_once().unwrap().unwrap();
        assert_eq!(first.batch_number, 1);
        assert_eq!(first.size, 8);
        assert!(first.mean_weight > 0.0 && first.mean_weight <= 1.0);
        assert!(first.mean_depth >= 1.0);

        let second = consumer.sample_once().unwrap().unwrap();
        assert_eq!(second.batch_number, 2);
        assert_eq!(stats.batches(), 2);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let stats = Arc::new(RunStats::new(dir.path(), "counter"));
        let buffer = replay::shared(ReplayBuffer::new(BufferConfig::default()));
        let mut consumer = consumer(buffer, stats);

        consumer.shutdown.store(true, Ordering::Relaxed);
        consumer.run().unwrap();
    }
}
