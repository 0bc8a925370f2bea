//! Progress-callback trait for per-recipient batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PersonalizeConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders each recipient's copy. Callers can forward
//! them to a terminal progress bar, a log, or a job-status record.
//!
//! # Example
//!
//! ```rust
//! use batchvault::{BatchProgressCallback, PersonalizeConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_recipient_complete(&self, index: usize, total: usize, name: &str, file_name: &str) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} -> {}", index, total, name, file_name);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     rendered: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PersonalizeConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the personalization pipeline as it processes each recipient.
///
/// Recipients are rendered one at a time, in load order. All methods have
/// default no-op implementations so callers only override what they care
/// about. `Send + Sync` because the async entry point runs the batch on a
/// blocking worker thread.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once the group is resolved, before any rendering.
    ///
    /// # Arguments
    /// * `total_recipients`: number of members that will be rendered
    fn on_batch_start(&self, total_recipients: usize) {
        let _ = total_recipients;
    }

    /// Called just before a recipient's copy is rendered.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: recipients in the batch
    /// * `name`: the member's display name
    fn on_recipient_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a recipient's copy was rendered.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: recipients in the batch
    /// * `name`: the member's display name
    /// * `file_name`: output file name inside the output directory
    fn on_recipient_complete(&self, index: usize, total: usize, name: &str, file_name: &str) {
        let _ = (index, total, name, file_name);
    }

    /// Called when rendering failed for a recipient. The batch continues.
    fn on_recipient_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after the batch result is committed.
    ///
    /// # Arguments
    /// * `total`: recipients in the batch
    /// * `success_count`: recipients whose copy was rendered
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PersonalizeConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
