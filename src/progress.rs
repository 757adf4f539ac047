//! Progress-callback trait for per-image extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator finalises each image.
//!
//! # Example
//!
//! ```rust
//! use course_extract::{CourseRecord, ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, record: &CourseRecord) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", index, total, record.source_file);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::record::CourseRecord;
use std::sync::Arc;

/// Called by the orchestrator as it processes a batch.
///
/// Images are processed one at a time, so events arrive in submission order.
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first image is loaded.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before an image is loaded and sent to the model.
    fn on_image_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when an image produced a record without any error annotation.
    fn on_image_complete(&self, index: usize, total: usize, record: &CourseRecord) {
        let _ = (index, total, record);
    }

    /// Called when an image was finalised with the fallback record.
    fn on_image_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
