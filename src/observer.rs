//! Observer trait for per-request conversion events.
//!
//! Inject an [`Arc<dyn ConversionObserver>`] via
//! [`crate::config::ConversionConfigBuilder::observer`] to receive structured
//! events as the pipeline handles each upload. Every event carries the
//! request's correlation identifier, so observers can aggregate concurrent
//! requests without any shared pipeline state.
//!
//! # Example
//!
//! ```rust
//! use docx2html::{ConversionConfig, ConversionObserver};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailedImages(AtomicUsize);
//!
//! impl ConversionObserver for FailedImages {
//!     fn on_media_failed(&self, request_id: &str, file: &Path, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{request_id}] {} left unconverted: {error}", file.display());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .observer(Arc::new(FailedImages(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it handles one upload.
///
/// Implementations must be `Send + Sync`: the HTTP server runs many requests
/// concurrently and shares one observer between them. All methods have
/// default no-op implementations so callers only override what they care about.
pub trait ConversionObserver: Send + Sync {
    /// Called once when a request enters the pipeline.
    fn on_request_start(&self, request_id: &str, filename: &str, size: usize) {
        let _ = (request_id, filename, size);
    }

    /// Called after the request's workspace directory exists.
    fn on_workspace_allocated(&self, request_id: &str, workspace: &Path) {
        let _ = (request_id, workspace);
    }

    /// Called once after discovery with the number of vector media files found.
    fn on_media_discovered(&self, request_id: &str, count: usize) {
        let _ = (request_id, count);
    }

    /// Called when a vector file was rasterised and its references rewritten.
    fn on_media_converted(&self, request_id: &str, from: &Path, to: &Path) {
        let _ = (request_id, from, to);
    }

    /// Called when a vector file is left unconverted.
    fn on_media_failed(&self, request_id: &str, file: &Path, error: &str) {
        let _ = (request_id, file, error);
    }

    /// Called once on every exit path, after transient files are scheduled
    /// for removal. `error` is `None` on success.
    fn on_request_complete(&self, request_id: &str, error: Option<&str>) {
        let _ = (request_id, error);
    }
}

/// A no-op implementation for callers that don't need events.
///
/// This is the default when no observer is configured.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type Observer = Arc<dyn ConversionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        discovered: AtomicUsize,
        converted: AtomicUsize,
        failed: AtomicUsize,
        completed: Mutex<Vec<Option<String>>>,
    }

    impl ConversionObserver for Recording {
        fn on_media_discovered(&self, _request_id: &str, count: usize) {
            self.discovered.store(count, Ordering::SeqCst);
        }

        fn on_media_converted(&self, _request_id: &str, _from: &Path, _to: &Path) {
            self.converted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_media_failed(&self, _request_id: &str, _file: &Path, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_request_complete(&self, _request_id: &str, error: Option<&str>) {
            self.completed.lock().unwrap().push(error.map(str::to_string));
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_request_start("1_a", "report.docx", 10);
        obs.on_workspace_allocated("1_a", Path::new("/tmp/ws"));
        obs.on_media_discovered("1_a", 2);
        obs.on_media_converted("1_a", Path::new("a.emf"), Path::new("a.png"));
        obs.on_media_failed("1_a", Path::new("b.wmf"), "boom");
        obs.on_request_complete("1_a", None);
    }

    #[test]
    fn recording_observer_receives_events() {
        let rec = Recording::default();
        rec.on_media_discovered("1_a", 3);
        rec.on_media_converted("1_a", Path::new("a.emf"), Path::new("a.png"));
        rec.on_media_converted("1_a", Path::new("b.emf"), Path::new("b.png"));
        rec.on_media_failed("1_a", Path::new("c.wmf"), "exit 1");
        rec.on_request_complete("1_a", None);
        rec.on_request_complete("2_b", Some("pandoc failed"));

        assert_eq!(rec.discovered.load(Ordering::SeqCst), 3);
        assert_eq!(rec.converted.load(Ordering::SeqCst), 2);
        assert_eq!(rec.failed.load(Ordering::SeqCst), 1);
        assert_eq!(
            *rec.completed.lock().unwrap(),
            vec![None, Some("pandoc failed".to_string())]
        );
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_request_start("1_a", "x.docx", 0);
    }
}
