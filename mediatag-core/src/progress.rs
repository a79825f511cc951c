//! Progress reporting and cooperative cancellation.
//!
//! Long-running rewrites report percent-complete and a step label through a
//! caller-supplied callback and observe a cancellation flag at well-defined
//! checkpoints (before each top-level element copy, after writing the tag
//! region, between chunk-offset table updates).

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callback type: `(step label, percent 0.0..=100.0)`.
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Progress feedback handle passed into write operations.
///
/// Cloning shares the cancellation flag, so a clone handed to another thread
/// can cancel an operation in flight.
#[derive(Clone, Default)]
pub struct ProgressFeedback {
    callback: Option<Arc<ProgressCallback>>,
    cancelled: Arc<AtomicBool>,
}

impl ProgressFeedback {
    /// Create a feedback handle with no callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Report a step and percentage to the callback, if any.
    pub fn report(&self, step: &str, percent: f64) {
        if let Some(ref callback) = self.callback {
            callback(step, percent.clamp(0.0, 100.0));
        }
    }

    /// Request cancellation. The operation stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Checkpoint: fail with [`Error::OperationAborted`] when cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::OperationAborted)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ProgressFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressFeedback")
            .field("has_callback", &self.callback.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let progress = ProgressFeedback::new().on_progress(move |step, pct| {
            seen_clone.lock().unwrap().push((step.to_string(), pct));
        });
        progress.report("copying mdat", 42.0);
        progress.report("overshoot", 150.0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("copying mdat".to_string(), 42.0));
        assert_eq!(seen[1].1, 100.0);
    }

    #[test]
    fn test_cancellation_shared_across_clones() {
        let progress = ProgressFeedback::new();
        let clone = progress.clone();
        assert!(progress.check().is_ok());
        clone.cancel();
        assert!(progress.check().unwrap_err().is_aborted());
    }
}
