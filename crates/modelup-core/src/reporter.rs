//! Reporter trait for dependency injection
//!
//! This trait allows the update driver to report progress and per-model
//! results without being coupled to a specific terminal or GUI frontend.

use std::sync::Arc;

use crate::error::UpdateError;
use crate::installer::{InstalledModel, ProgressEvent};
use crate::planner::PendingUpdate;

/// Receives per-model lifecycle events from [`crate::updater::Updater`].
pub trait Reporter: Send + Sync {
    /// An install attempt for `update` is starting.
    fn started(&self, update: &PendingUpdate);

    /// Download progress for a model.
    fn progress(&self, event: &ProgressEvent);

    /// A model was committed and recorded.
    fn updated(&self, installed: &InstalledModel);

    /// A model failed after all retries.
    fn failed(&self, name: &str, error: &UpdateError);
}

impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    fn started(&self, update: &PendingUpdate) {
        (**self).started(update);
    }
    fn progress(&self, event: &ProgressEvent) {
        (**self).progress(event);
    }
    fn updated(&self, installed: &InstalledModel) {
        (**self).updated(installed);
    }
    fn failed(&self, name: &str, error: &UpdateError) {
        (**self).failed(name, error);
    }
}

/// A no-op reporter for silent operations (e.g., embedding, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn started(&self, _: &PendingUpdate) {}
    fn progress(&self, _: &ProgressEvent) {}
    fn updated(&self, _: &InstalledModel) {}
    fn failed(&self, _: &str, _: &UpdateError) {}
}
