//! Polling model reloader.
//!
//! Checks the modification time of `<data_dir>/models/latest.json` and,
//! when it changes, loads the file and publishes it into the shared
//! [`ModelSnapshot`]. Players and the reanalyser pick the new weights up on
//! their next refresh.

use anyhow::{anyhow, Result};
use mcts::ActionSpace;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::model_snapshot::ModelSnapshot;
use crate::reference_model::LinearModel;

pub const MODEL_FILENAME: &str = "latest.json";

pub struct ModelWatcher {
    model_path: PathBuf,
    observation_size: usize,
    space: ActionSpace,
    last_mtime: Option<SystemTime>,
}

impl ModelWatcher {
    pub fn new(model_dir: impl AsRef<Path>, observation_size: usize, space: ActionSpace) -> Self {
        Self {
            model_path: model_dir.as_ref().join(MODEL_FILENAME),
            observation_size,
            space,
            last_mtime: None,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Publish the model file if it changed since the last poll.
    ///
    /// Returns the new snapshot version, or `None` when the file is missing
    /// or unchanged. A file that fails to load is not retried until it is
    /// modified again.
    pub fn poll(&mut self, snapshot: &ModelSnapshot<LinearModel>) -> Result<Option<u64>> {
        let mtime = match fs::metadata(&self.model_path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return Ok(None),
        };
        if self.last_mtime == Some(mtime) {
            return Ok(None);
        }
        self.last_mtime = Some(mtime);

        debug!(path = %self.model_path.display(), "Model file changed, reloading");
        let model = LinearModel::load(&self.model_path)?;
        if !model.fits(self.observation_size, &self.space) {
            return Err(anyhow!(
                "Model {} does not match observation size {} and {} actions",
                self.model_path.display(),
                self.observation_size,
                self.space.len()
            ));
        }

        let version = snapshot.publish(model)?;
        info!(
            path = %self.model_path.display(),
            version,
            "Loaded model from disk"
        );
        Ok(Some(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_model::ModelSettings;
    use std::time::Duration;
    use tempfile::tempdir;

    fn settings(seed: u64) -> ModelSettings {
        ModelSettings {
            observation_size: 4,
            latent_size: 8,
            hidden_size: 8,
            support_width: 3,
            value_prefix: false,
            categorical_value: true,
            seed,
        }
    }

    fn touch_later(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let dir = tempdir().unwrap();
        let space = ActionSpace::discrete(2);
        let snapshot = ModelSnapshot::new(LinearModel::new(settings(0), &space));
        let mut watcher = ModelWatcher::new(dir.path(), 4, space);

        assert_eq!(watcher.poll(&snapshot).unwrap(), None);
        assert_eq!(snapshot.version(), 0);
    }

    #[test]
    fn test_publishes_on_change_only() {
        let dir = tempdir().unwrap();
        let space = ActionSpace::discrete(2);
        let snapshot = ModelSnapshot::new(LinearModel::new(settings(0), &space));
        let mut watcher = ModelWatcher::new(dir.path(), 4, space.clone());

        LinearModel::new(settings(7), &space)
            .save(watcher.model_path())
            .unwrap();
        assert_eq!(watcher.poll(&snapshot).unwrap(), Some(1));
        assert_eq!(watcher.poll(&snapshot).unwrap(), None);

        let (model, version) = snapshot.load().unwrap();
        assert_eq!(version, 1);
        assert_eq!(model.settings().seed, 7);

        LinearModel::new(settings(8), &space)
            .save(watcher.model_path())
            .unwrap();
        touch_later(watcher.model_path(), 10);
        assert_eq!(watcher.poll(&snapshot).unwrap(), Some(2));
        assert_eq!(snapshot.load().unwrap().0.settings().seed, 8);
    }

    #[test]
    fn test_mismatched_model_is_rejected() {
        let dir = tempdir().unwrap();
        let space = ActionSpace::discrete(2);
        let snapshot = ModelSnapshot::new(LinearModel::new(settings(0), &space));
        let mut watcher = ModelWatcher::new(dir.path(), 4, space);

        LinearModel::new(settings(1), &ActionSpace::discrete(3))
            .save(watcher.model_path())
            .unwrap();
        let err = watcher.poll(&snapshot).unwrap_err();
        assert!(err.to_string().contains("does not match"));
        assert_eq!(snapshot.version(), 0);

        // Not retried until the file changes.
        assert_eq!(watcher.poll(&snapshot).unwrap(), None);
    }
}
