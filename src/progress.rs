//! Progress-callback trait for per-chunk events.
//!
//! Inject an [`Arc<dyn PaperProgressCallback>`] via
//! [`crate::config::PaperConfigBuilder::progress_callback`] to receive events
//! as the pipeline checks boundaries and annotates chunks. Callers can
//! forward them to a terminal progress bar, a channel or a database without
//! the library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_paper2tex::{PaperConfig, PaperProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PaperProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total: usize, markup_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} done ({} bytes)", chunk, total, markup_len);
//!     }
//! }
//!
//! let config = PaperConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes a paper.
///
/// All methods have default no-op implementations. Chunk numbers are
/// 1-indexed. With `annotation_concurrency > 1` the chunk methods may be
/// called from several tasks at once.
pub trait PaperProgressCallback: Send + Sync {
    /// Called once after the initial split, before any remote call.
    fn on_run_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called after each chunk boundary has been checked (and possibly moved).
    fn on_boundary_checked(&self, boundary: usize, total_boundaries: usize) {
        let _ = (boundary, total_boundaries);
    }

    /// Called just before the annotation request for a finalized chunk.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called when a chunk is annotated successfully.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, markup_len: usize) {
        let _ = (chunk, total_chunks, markup_len);
    }

    /// Called when a chunk fails after all attempts.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called once after every finalized chunk has been attempted.
    fn on_run_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PaperProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PaperConfig`].
pub type ProgressCallback = Arc<dyn PaperProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        boundaries: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PaperProgressCallback for TrackingCallback {
        fn on_boundary_checked(&self, _boundary: usize, _total: usize) {
            self.boundaries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _chunk: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _chunk: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _chunk: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_boundary_checked(1, 2);
        cb.on_chunk_start(1, 3);
        cb.on_chunk_complete(1, 3, 42);
        cb.on_chunk_error(2, 3, "timeout");
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_boundary_checked(1, 1);
        tracker.on_chunk_start(1, 2);
        tracker.on_chunk_complete(1, 2, 100);
        tracker.on_chunk_start(2, 2);
        tracker.on_chunk_error(2, 2, "empty");

        assert_eq!(tracker.boundaries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
