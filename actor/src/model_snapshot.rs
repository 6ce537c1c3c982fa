//! Shared, versioned model snapshot.
//!
//! A publisher swaps in new weights with [`ModelSnapshot::publish`]; every
//! task holds a [`ModelHandle`] with its own `Arc` to the model and only
//! touches the lock when the version counter has moved. A task may run on a
//! stale model for at most one refresh cycle.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// The current model and its version.
#[derive(Debug)]
pub struct ModelSnapshot<M> {
    current: RwLock<Arc<M>>,
    version: AtomicU64,
}

impl<M> ModelSnapshot<M> {
    /// Snapshot holding `model` as version 0.
    pub fn new(model: M) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
            version: AtomicU64::new(0),
        }
    }

    /// Replace the model and bump the version.
    pub fn publish(&self, model: M) -> Result<u64> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| anyhow!("Failed to acquire model write lock: {}", e))?;
        *guard = Arc::new(model);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        info!(version, "Published new model");
        Ok(version)
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The current model with the version it was read at.
    pub fn load(&self) -> Result<(Arc<M>, u64)> {
        let guard = self
            .current
            .read()
            .map_err(|e| anyhow!("Failed to acquire model read lock: {}", e))?;
        // Read under the lock so that the pair is consistent with `publish`.
        Ok((Arc::clone(&guard), self.version()))
    }
}

/// A task's local view of a [`ModelSnapshot`].
#[derive(Debug)]
pub struct ModelHandle<M> {
    snapshot: Arc<ModelSnapshot<M>>,
    model: Arc<M>,
    version: u64,
}

impl<M> ModelHandle<M> {
    pub fn new(snapshot: Arc<ModelSnapshot<M>>) -> Result<Self> {
        let (model, version) = snapshot.load()?;
        Ok(Self {
            snapshot,
            model,
            version,
        })
    }

    /// Pick up a newer model if one was published. Returns true on change.
    pub fn refresh(&mut self) -> Result<bool> {
        if self.snapshot.version() == self.version {
            return Ok(false);
        }
        let (model, version) = self.snapshot.load()?;
        debug!(from = self.version, to = version, "Refreshed model");
        self.model = model;
        self.version = version;
        Ok(true)
    }

    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_bumps_version() {
        let snapshot = ModelSnapshot::new(1u32);
        assert_eq!(snapshot.version(), 0);

        assert_eq!(snapshot.publish(2).unwrap(), 1);
        let (model, version) = snapshot.load().unwrap();
        assert_eq!(*model, 2);
        assert_eq!(version, 1);
    }

    #[test]
    fn test_handle_refreshes_only_on_new_version() {
        let snapshot = Arc::new(ModelSnapshot::new("v0"));
        let mut handle = ModelHandle::new(Arc::clone(&snapshot)).unwrap();

        assert!(!handle.refresh().unwrap());
        assert_eq!(*handle.model(), "v0");

        snapshot.publish("v1").unwrap();
        // Still on the old model until refreshed.
        assert_eq!(*handle.model(), "v0");
        assert!(handle.refresh().unwrap());
        assert_eq!(*handle.model(), "v1");
        assert_eq!(handle.version(), 1);
        assert!(!handle.refresh().unwrap());
    }

    #[test]
    fn test_handles_are_independent() {
        let snapshot = Arc::new(ModelSnapshot::new(0u8));
        let mut a = ModelHandle::new(Arc::clone(&snapshot)).unwrap();
        let b = ModelHandle::new(Arc::clone(&snapshot)).unwrap();

        snapshot.publish(9).unwrap();
        a.refresh().unwrap();
        assert_eq!(*a.model(), 9);
        assert_eq!(*b.model(), 0);
    }
}
