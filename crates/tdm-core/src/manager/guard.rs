//! RAII guard that deregisters a monitored job when its monitor exits.

use crate::registry::{JobControl, JobRegistry};
use std::sync::Arc;

/// Removes the job's own registry entry and returns its executor slot when
/// dropped, including when the monitor task panics.
pub(super) struct MonitorGuard<'a> {
    pub(super) registry: &'a JobRegistry,
    pub(super) control: Arc<JobControl>,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!(job_id = self.control.job_id(), "progress monitor panicked");
        }
        if self.registry.remove_if_current(&self.control) {
            tracing::debug!(job_id = self.control.job_id(), "job deregistered");
        }
        self.control.release_slot();
    }
}
