//! Progress-callback trait for per-item batch events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to [`crate::batch::run_batch`]
//! to receive events as the batch engine aggregates results. The CLI renders
//! these as an `indicatif` bar; library users can forward them anywhere.
//!
//! Events are delivered from the coordinating task only, in completion order,
//! never concurrently with each other.
//!
//! # Example
//!
//! ```rust
//! use edgequake_kb::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_complete(&self, done: usize, total: usize, input: &str, output: &std::path::Path) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} -> {}", done, total, input, output.display());
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch engine as conversions finish.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after validation, before any conversion is dispatched.
    ///
    /// # Arguments
    /// * `total`   — number of unique inputs read
    /// * `valid`   — inputs that passed validation and will be converted
    /// * `invalid` — inputs rejected during validation
    fn on_batch_start(&self, total: usize, valid: usize, invalid: usize) {
        let _ = (total, valid, invalid);
    }

    /// Called when an item converts and its file is written.
    fn on_item_complete(&self, done: usize, total: usize, input: &str, output: &Path) {
        let _ = (done, total, input, output);
    }

    /// Called when an item fails after its retry budget is spent.
    fn on_item_error(&self, done: usize, total: usize, input: &str, error: &str) {
        let _ = (done, total, input, error);
    }

    /// Called once after every dispatched item has finished.
    fn on_batch_complete(&self, successful: usize, failed: usize) {
        let _ = (successful, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
