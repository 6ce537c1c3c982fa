//! Run statistics shared by the player, reanalyser and batch consumer.
//!
//! Counters are atomics so that every task can update them without a lock.
//! The global game and frame counts double as the clock for the play
//! temperature schedule and reanalysis staleness.
//!
//! A JSON snapshot is written to `<data_dir>/run_stats.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Lock-free run counters.
#[derive(Debug)]
pub struct RunStats {
    games: AtomicU64,
    frames: AtomicU64,
    batches: AtomicU64,
    reanalysed: AtomicU64,
    /// Sum of game scores, stored as f64 bits.
    score_sum: AtomicU64,
    /// Best game score, stored as f64 bits (NaN until the first game).
    best_score: AtomicU64,
    searches: AtomicU64,
    search_us: AtomicU64,
    model_version: AtomicU64,
    start_time: Instant,
    stats_path: PathBuf,
    env_name: String,
}

/// Serializable stats for JSON output.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatsSnapshot {
    pub env_name: String,
    pub games_played: u64,
    pub total_frames: u64,
    pub batches_sampled: u64,
    pub episodes_reanalysed: u64,
    pub mean_score: f64,
    pub best_score: Option<f64>,
    pub frames_per_second: f64,
    pub avg_search_us: f64,
    pub model_version: u64,
    pub runtime_seconds: f64,
    pub timestamp: u64,
}

/// Totals right after a game was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTotals {
    pub games: u64,
    pub frames: u64,
}

fn add_f64(cell: &AtomicU64, value: f64) {
    // fetch_update only fails when the closure returns None.
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        Some((f64::from_bits(bits) + value).to_bits())
    });
}

fn max_f64(cell: &AtomicU64, value: f64) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        let current = f64::from_bits(bits);
        (current.is_nan() || value > current).then_some(value.to_bits())
    });
}

impl RunStats {
    /// Create new stats tracker.
    pub fn new(data_dir: impl AsRef<Path>, env_name: &str) -> Self {
        let data_dir = data_dir.as_ref();

        // Ensure data directory exists
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("Failed to create data directory: {}", e);
        }

        Self {
            games: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            reanalysed: AtomicU64::new(0),
            score_sum: AtomicU64::new(0f64.to_bits()),
            best_score: AtomicU64::new(f64::NAN.to_bits()),
            searches: AtomicU64::new(0),
            search_us: AtomicU64::new(0),
            model_version: AtomicU64::new(0),
            start_time: Instant::now(),
            stats_path: data_dir.join("run_stats.json"),
            env_name: env_name.to_string(),
        }
    }

    /// Record a finished game and return the new totals.
    pub fn record_game(&self, frames: u64, score: f64) -> GameTotals {
        let total_frames = self.frames.fetch_add(frames, Ordering::AcqRel) + frames;
        add_f64(&self.score_sum, score);
        max_f64(&self.best_score, score);
        let games = self.games.fetch_add(1, Ordering::AcqRel) + 1;
        GameTotals {
            games,
            frames: total_frames,
        }
    }

    /// Record the searches run for one game or one reanalysis pass.
    pub fn record_searches(&self, searches: u64, elapsed_us: u64) {
        self.searches.fetch_add(searches, Ordering::Relaxed);
        self.search_us.fetch_add(elapsed_us, Ordering::Relaxed);
    }

    pub fn record_model_version(&self, version: u64) {
        self.model_version.fetch_max(version, Ordering::Relaxed);
    }

    pub fn record_batch(&self) -> u64 {
        self.batches.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_reanalysis(&self) -> u64 {
        self.reanalysed.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn games(&self) -> u64 {
        self.games.load(Ordering::Acquire)
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> RunStatsSnapshot {
        let games = self.games();
        let frames = self.frames();
        let runtime = self.start_time.elapsed().as_secs_f64();
        let searches = self.searches.load(Ordering::Relaxed);
        let search_us = self.search_us.load(Ordering::Relaxed);
        let score_sum = f64::from_bits(self.score_sum.load(Ordering::Relaxed));
        let best = f64::from_bits(self.best_score.load(Ordering::Relaxed));

        let mean_score = if games > 0 {
            score_sum / games as f64
        } else {
            0.0
        };

        let frames_per_second = if runtime > 0.0 {
            frames as f64 / runtime
        } else {
            0.0
        };

        let avg_search_us = if searches > 0 {
            search_us as f64 / searches as f64
        } else {
            0.0
        };

        RunStatsSnapshot {
            env_name: self.env_name.clone(),
            games_played: games,
            total_frames: frames,
            batches_sampled: self.batches(),
            episodes_reanalysed: self.reanalysed.load(Ordering::Relaxed),
            mean_score,
            best_score: (!best.is_nan()).then_some(best),
            frames_per_second,
            avg_search_us,
            model_version: self.model_version.load(Ordering::Relaxed),
            runtime_seconds: runtime,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Write stats to JSON file (atomic write-then-rename).
    pub fn write_stats(&self) {
        let snapshot = self.snapshot();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize run stats: {}", e);
                return;
            }
        };

        // Write to temp file then rename (atomic on most filesystems)
        let temp_path = self.stats_path.with_extension("json.tmp");
        match fs::File::create(&temp_path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(json.as_bytes()) {
                    warn!("Failed to write run stats: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to create temp stats file: {}", e);
                return;
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.stats_path) {
            warn!("Failed to rename stats file: {}", e);
            let _ = fs::remove_file(&temp_path);
            return;
        }

        debug!("Wrote run stats to {}", self.stats_path.display());
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }
}
