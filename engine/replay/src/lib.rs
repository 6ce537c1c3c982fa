//! Prioritized episode replay with reanalysis support.
//!
//! # Overview
//!
//! - [`EpisodeRecord`]: one played episode; builds n-step bootstrapped
//!   training targets and per-step priorities
//! - [`ReplayBuffer`]: bounded FIFO of episodes addressed by stable ids, with
//!   uniform or prioritized batch sampling and importance weights
//! - [`ReplaySnapshot`]: the persisted `(episodes, episode_ids)` pair
//!
//! # Concurrency
//!
//! The buffer itself is single-threaded. Tasks share it through
//! [`SharedReplayBuffer`]: mutators (`save_game`, `update_vals`,
//! `add_priorities`) take the write lock, so the derived-state recomputation
//! and sampling in `get_batch` never interleave with a mutation. Readers may
//! run concurrently with each other.

pub mod buffer;
pub mod episode;
pub mod error;
pub mod snapshot;

use std::sync::{Arc, RwLock};

pub use buffer::{Batch, BufferConfig, ReplayBuffer};
pub use episode::{EpisodeRecord, Target, PRIORITY_FLOOR};
pub use error::ReplayError;
pub use snapshot::ReplaySnapshot;

/// Replay buffer shared between player, reanalyser and trainer tasks.
pub type SharedReplayBuffer = Arc<RwLock<ReplayBuffer>>;

/// Wrap a buffer for sharing between tasks.
pub fn shared(buffer: ReplayBuffer) -> SharedReplayBuffer {
    Arc::new(RwLock::new(buffer))
}
