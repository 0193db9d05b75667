//! Progress-callback trait for catalog retrieval events.
//!
//! Inject an [`Arc<dyn RetrievalProgressCallback>`] via
//! [`crate::config::CatalogConfigBuilder::progress_callback`] to receive
//! events as each resource is fetched, retried and cached. The CLI uses it
//! to drive a terminal spinner; library callers can forward the events
//! wherever they like.
//!
//! # Example
//!
//! ```rust
//! use science_helper::{CatalogConfig, RetrievalProgressCallback, Resource};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RetryCounter(AtomicUsize);
//!
//! impl RetrievalProgressCallback for RetryCounter {
//!     fn on_retry(&self, resource: Resource, attempt: u32, max_attempts: u32, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{resource}: attempt {attempt}/{max_attempts} failed: {error}");
//!     }
//! }
//!
//! let config = CatalogConfig::builder()
//!     .progress_callback(Arc::new(RetryCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::Resource;
use std::sync::Arc;

/// Called by the retriever as it downloads each resource.
///
/// Implementations must be `Send + Sync`: catalog and whitelist are fetched
/// concurrently, so events for different resources may interleave. All
/// methods have default no-op implementations.
pub trait RetrievalProgressCallback: Send + Sync {
    /// Called before the first attempt for `resource`.
    fn on_fetch_start(&self, resource: Resource, url: &str) {
        let _ = (resource, url);
    }

    /// Called after a transient failure, before backing off.
    ///
    /// # Arguments
    /// * `attempt`     : 1-indexed attempt that just failed
    /// * `max_attempts`: configured attempt budget
    /// * `error`       : human-readable failure description
    fn on_retry(&self, resource: Resource, attempt: u32, max_attempts: u32, error: &str) {
        let _ = (resource, attempt, max_attempts, error);
    }

    /// Called once the resource is downloaded and cached.
    fn on_fetch_complete(&self, resource: Resource, bytes: usize) {
        let _ = (resource, bytes);
    }

    /// Called when the resource could not be fetched.
    fn on_fetch_error(&self, resource: Resource, error: &str) {
        let _ = (resource, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RetrievalProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CatalogConfig`].
pub type ProgressCallback = Arc<dyn RetrievalProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        retries: AtomicUsize,
        completed_bytes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl RetrievalProgressCallback for TrackingCallback {
        fn on_fetch_start(&self, _resource: Resource, _url: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _resource: Resource, _attempt: u32, _max: u32, _error: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fetch_complete(&self, _resource: Resource, bytes: usize) {
            self.completed_bytes.fetch_add(bytes, Ordering::SeqCst);
        }

        fn on_fetch_error(&self, _resource: Resource, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_fetch_start(Resource::Catalog, "https://vak.example/list.pdf");
        cb.on_retry(Resource::Catalog, 1, 3, "HTTP 503");
        cb.on_fetch_complete(Resource::Catalog, 1024);
        cb.on_fetch_error(Resource::Whitelist, "timed out");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_fetch_start(Resource::Catalog, "u1");
        tracker.on_fetch_start(Resource::Whitelist, "u2");
        tracker.on_retry(Resource::Catalog, 1, 3, "HTTP 500");
        tracker.on_fetch_complete(Resource::Catalog, 100);
        tracker.on_fetch_complete(Resource::Whitelist, 20);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_bytes.load(Ordering::SeqCst), 120);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_fetch_start(Resource::Nomenclature, "u");
    }
}
