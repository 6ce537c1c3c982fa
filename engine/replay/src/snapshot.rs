//! Persisted buffer snapshot.
//!
//! Only the episodes and their identifiers are stored; the flat index and
//! priority distribution are rebuilt on load.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::{BufferConfig, ReplayBuffer};
use crate::episode::EpisodeRecord;
use crate::error::ReplayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub episodes: Vec<EpisodeRecord>,
    pub episode_ids: Vec<u64>,
}

impl ReplayBuffer {
    /// Copy out the persisted part of the buffer.
    pub fn snapshot(&self) -> ReplaySnapshot {
        ReplaySnapshot {
            episodes: self.episodes().cloned().collect(),
            episode_ids: self.episode_ids(),
        }
    }

    /// Rebuild a buffer from a snapshot, recomputing derived state.
    pub fn from_snapshot(config: BufferConfig, snapshot: ReplaySnapshot) -> Result<Self, ReplayError> {
        Self::from_parts(config, snapshot.episodes, snapshot.episode_ids)
    }

    /// Write the snapshot as JSON (atomic write-then-rename).
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let path = path.as_ref();
        let json = serde_json::to_vec(&self.snapshot())?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&json)?;
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = %path.display(), episodes = self.len(), "Saved replay buffer");
        Ok(())
    }

    /// Load a buffer written by [`ReplayBuffer::save_snapshot`].
    pub fn load_snapshot(config: BufferConfig, path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let snapshot: ReplaySnapshot = serde_json::from_slice(&bytes)?;
        let buffer = Self::from_snapshot(config, snapshot)?;

        info!(
            path = %path.display(),
            episodes = buffer.len(),
            total_steps = buffer.total_steps(),
            "Loaded replay buffer"
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcts::{Action, ActionSpace};
    use tempfile::TempDir;

    fn episode(len: usize) -> EpisodeRecord {
        let space = ActionSpace::discrete(3);
        let mut rec = EpisodeRecord::new(&space, 0.99, 0);
        for i in 0..len {
            rec.observations.push(vec![i as f32; 4]);
            rec.actions.push(Action::Discrete(i % 3));
            rec.rewards.push(i as f32);
            rec.search_policies.push(vec![vec![0.2, 0.3, 0.5]]);
            rec.values.push(0.5 * i as f32);
        }
        rec.add_priorities(2, false);
        rec
    }

    #[test]
    fn test_snapshot_round_trip_rebuilds_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buffers").join("counter.json");

        let config = BufferConfig {
            capacity: 2,
            ..BufferConfig::default()
        };
        let mut buffer = ReplayBuffer::new(config.clone());
        for len in [3, 4, 5] {
            buffer.save_game(episode(len)).unwrap();
        }
        buffer.save_snapshot(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = ReplayBuffer::load_snapshot(config, &path).unwrap();
        assert_eq!(loaded.episode_ids(), vec![1, 2]);
        assert_eq!(loaded.total_steps(), 9);
        assert_eq!(loaded.game_starts(), &[0, 4]);
        assert_eq!(loaded.priorities().len(), 9);
        assert_eq!(loaded.get_episode(2).unwrap().values, buffer.get_episode(2).unwrap().values);
    }

    #[test]
    fn test_loaded_buffer_continues_ids() {
        let config = BufferConfig::default();
        let mut buffer = ReplayBuffer::new(config.clone());
        buffer.save_game(episode(2)).unwrap();
        buffer.save_game(episode(2)).unwrap();

        let mut restored = ReplayBuffer::from_snapshot(config, buffer.snapshot()).unwrap();
        assert_eq!(restored.save_game(episode(2)).unwrap(), 2);
    }

    #[test]
    fn test_snapshot_trimmed_to_capacity() {
        let snapshot = ReplaySnapshot {
            episodes: vec![episode(1), episode(2), episode(3)],
            episode_ids: vec![10, 11, 12],
        };
        let config = BufferConfig {
            capacity: 2,
            ..BufferConfig::default()
        };
        let buffer = ReplayBuffer::from_snapshot(config, snapshot).unwrap();
        assert_eq!(buffer.episode_ids(), vec![11, 12]);
        assert_eq!(buffer.total_steps(), 5);
    }

    #[test]
    fn test_mismatched_snapshot_rejected() {
        let snapshot = ReplaySnapshot {
            episodes: vec![episode(1)],
            episode_ids: vec![],
        };
        assert!(ReplayBuffer::from_snapshot(BufferConfig::default(), snapshot).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = ReplayBuffer::load_snapshot(BufferConfig::default(), dir.path().join("missing.json"));
        assert!(matches!(result, Err(ReplayError::Io(_))));
    }
}
