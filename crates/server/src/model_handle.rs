//! Shared, hot-reloadable forecaster.
//!
//! The model file is re-checked at the start of every forecast request and
//! reloaded when its modification time moves past the last one seen.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{info, warn};

use parkcast_forecast::{ForecastError, Forecaster};

#[derive(Default)]
struct Slot {
    model: Option<Arc<Forecaster>>,
    /// mtime of the last file we attempted to load.
    seen: Option<SystemTime>,
}

pub struct ModelHandle {
    path: PathBuf,
    slot: RwLock<Slot>,
}

impl ModelHandle {
    /// Handle for `path` with nothing loaded yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: RwLock::new(Slot::default()),
        }
    }

    /// Create the handle and try a first load. A missing or broken file is
    /// logged; forecasts answer 503 until a usable file shows up.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let handle = Self::new(path);
        if !handle.path.exists() {
            warn!(
                "Model not found at {}. Train one with `parkcast train`; forecasts are unavailable until then.",
                handle.path.display()
            );
        }
        handle.reload_if_changed().await;
        handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn current(&self) -> Option<Arc<Forecaster>> {
        self.slot.read().await.model.clone()
    }

    /// Reload when the file's mtime is newer than the last one seen.
    /// Returns true when a new model was installed.
    pub async fn reload_if_changed(&self) -> bool {
        let Some(mtime) = modified(&self.path).await else {
            return false;
        };

        if !is_newer(mtime, self.slot.read().await.seen) {
            return false;
        }

        let mut slot = self.slot.write().await;
        // another request may have reloaded while we waited for the lock
        if !is_newer(mtime, slot.seen) {
            return false;
        }
        slot.seen = Some(mtime);

        match load(self.path.clone()).await {
            Ok(forecaster) => {
                info!(
                    "Loaded {} model from {} ({} features)",
                    forecaster.kind(),
                    self.path.display(),
                    forecaster.feature_columns().len()
                );
                slot.model = Some(Arc::new(forecaster));
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload model from {}; keeping previous", self.path.display());
                false
            }
        }
    }
}

fn is_newer(mtime: SystemTime, seen: Option<SystemTime>) -> bool {
    seen.map_or(true, |seen| mtime > seen)
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

async fn load(path: PathBuf) -> Result<Forecaster, ForecastError> {
    tokio::task::spawn_blocking(move || Forecaster::load(&path))
        .await
        .map_err(|e| ForecastError::Backend(format!("model load task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_than_seen() {
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + std::time::Duration::from_secs(1);
        assert!(is_newer(t0, None));
        assert!(is_newer(t1, Some(t0)));
        assert!(!is_newer(t0, Some(t0)));
        assert!(!is_newer(t0, Some(t1)));
    }

    #[tokio::test]
    async fn missing_file_leaves_handle_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = ModelHandle::open(tmp.path().join("none.json")).await;
        assert!(handle.current().await.is_none());
        assert!(!handle.reload_if_changed().await);
    }

    #[tokio::test]
    async fn broken_file_is_not_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();

        let handle = ModelHandle::new(&path);
        assert!(!handle.reload_if_changed().await);
        assert!(handle.current().await.is_none());
        // same mtime, no second attempt
        assert!(!handle.reload_if_changed().await);
    }
}
