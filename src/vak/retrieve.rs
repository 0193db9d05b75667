//! Catalog retrieval: download the catalog PDF, the whitelist JSON and the
//! nomenclature HTML into the local cache.
//!
//! ## Retry policy
//!
//! Each resource gets up to `max_attempts` attempts. Timeouts, transport
//! errors, HTTP 429 and 5xx are transient and retried after
//! `retry_backoff_ms * 2^(attempt-1)`; any other HTTP status ends the fetch
//! at once. When the budget is spent the last [`FetchFailure`] is returned
//! inside [`ScienceHelperError::RetrievalError`].
//!
//! ## Cache writes
//!
//! Downloaded bytes are content-checked (`%PDF` magic, valid JSON) before
//! they replace the cached copy, and the replacement is atomic. A failed or
//! rejected download leaves the previous cache file untouched.
//!
//! ## One flight per resource
//!
//! Fetches are serialised per cache file through a process-wide lock table,
//! so concurrent callers (even with separate retrievers) never download the
//! same resource twice at once.

use crate::config::{CatalogConfig, Resource};
use crate::error::{FetchFailure, ScienceHelperError};
use crate::output::write_atomic_async;
use crate::progress::RetrievalProgressCallback;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

static FLIGHTS: Lazy<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| std::sync::Mutex::new(HashMap::new()));

/// The flight lock guarding the cache file at `path`.
fn flight_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut table = FLIGHTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    table.entry(path.to_path_buf()).or_default().clone()
}

/// A resource that was downloaded and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub resource: Resource,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Outcome of [`CatalogRetriever::refresh_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub catalog: FetchedResource,
    pub whitelist: FetchedResource,
    /// `None` when no nomenclature URL is configured.
    pub nomenclature: Option<FetchedResource>,
}

/// Downloads catalog resources with retry, one flight per resource at a time.
pub struct CatalogRetriever {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl CatalogRetriever {
    pub fn new(config: &CatalogConfig) -> Result<Self, ScienceHelperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.retrieval.download_timeout_secs.max(1)))
            .user_agent(concat!("science-helper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScienceHelperError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn callback(&self) -> Option<&dyn RetrievalProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    /// Cache path for `resource` under the current configuration.
    pub fn cache_path(&self, resource: Resource) -> PathBuf {
        self.config
            .cache
            .path_for(resource, self.config.endpoints.url(resource))
    }

    /// Download `resource`, check it, and replace the cached copy.
    ///
    /// # Errors
    /// * [`ScienceHelperError::InvalidConfig`] when no URL is configured.
    /// * [`ScienceHelperError::RetrievalError`] after the attempt budget.
    /// * [`ScienceHelperError::ParseError`] when the content is not what the
    ///   resource should be.
    /// * [`ScienceHelperError::OutputWriteFailed`] when the cache cannot be written.
    pub async fn fetch(&self, resource: Resource) -> Result<FetchedResource, ScienceHelperError> {
        let url = self.config.endpoints.url(resource).ok_or_else(|| {
            ScienceHelperError::InvalidConfig(format!("no URL configured for the {resource}"))
        })?;

        let lock = flight_lock(&self.cache_path(resource));
        let _flight = lock.lock().await;

        if let Some(cb) = self.callback() {
            cb.on_fetch_start(resource, url);
        }
        let result = self.fetch_locked(resource, url).await;
        if let (Err(e), Some(cb)) = (&result, self.callback()) {
            cb.on_fetch_error(resource, &e.to_string());
        }
        result
    }

    async fn fetch_locked(
        &self,
        resource: Resource,
        url: &str,
    ) -> Result<FetchedResource, ScienceHelperError> {
        let start = Instant::now();
        info!("Fetching {} from {}", resource, url);

        // ── Step 1: Download with retry ──────────────────────────────────
        let bytes = self.download_with_retry(resource, url).await?;

        // ── Step 2: Content check ────────────────────────────────────────
        check_content(resource, url, &bytes)?;

        // ── Step 3: Atomic cache write ───────────────────────────────────
        let path = self.cache_path(resource);
        let len = bytes.len();
        write_atomic_async(&path, bytes).await?;

        if let Some(cb) = self.callback() {
            cb.on_fetch_complete(resource, len);
        }
        info!(
            "Cached {} → {} ({} bytes, {}ms)",
            resource,
            path.display(),
            len,
            start.elapsed().as_millis()
        );
        Ok(FetchedResource {
            resource,
            path,
            bytes: len,
        })
    }

    async fn download_with_retry(
        &self,
        resource: Resource,
        url: &str,
    ) -> Result<Vec<u8>, ScienceHelperError> {
        let policy = &self.config.retrieval;
        let max_attempts = policy.max_attempts.max(1);

        let mut attempt = 1u32;
        loop {
            match self.download_once(url).await {
                Ok(bytes) => {
                    debug!("{}: attempt {} returned {} bytes", resource, attempt, bytes.len());
                    return Ok(bytes);
                }
                Err(failure) if failure.is_transient() && attempt < max_attempts => {
                    let backoff = policy
                        .retry_backoff_ms
                        .saturating_mul(1u64 << (attempt - 1).min(20));
                    warn!(
                        "{}: attempt {}/{} failed: {}; retrying in {}ms",
                        resource, attempt, max_attempts, failure, backoff
                    );
                    if let Some(cb) = self.callback() {
                        cb.on_retry(resource, attempt, max_attempts, &failure.to_string());
                    }
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(failure) => {
                    return Err(ScienceHelperError::RetrievalError {
                        url: url.to_string(),
                        attempts: attempt,
                        source: failure,
                    });
                }
            }
        }
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        let timeout = self.config.retrieval.download_timeout_secs;
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchFailure::Timeout(timeout)
            } else {
                FetchFailure::Transport(e)
            }
        };

        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }

    /// Cached path of `resource`, downloading it first when absent.
    pub async fn ensure(&self, resource: Resource) -> Result<PathBuf, ScienceHelperError> {
        let path = self.cache_path(resource);
        if path.is_file() {
            debug!("Using cached {} at {}", resource, path.display());
            return Ok(path);
        }
        Ok(self.fetch(resource).await?.path)
    }

    /// Refresh catalog and whitelist (and the nomenclature when configured)
    /// concurrently. Every fetch runs to completion; the first error is
    /// returned, and resources that did succeed stay cached.
    pub async fn refresh_all(&self) -> Result<RefreshReport, ScienceHelperError> {
        let nomenclature = async {
            match self.config.endpoints.nomenclature_url {
                Some(_) => self.fetch(Resource::Nomenclature).await.map(Some),
                None => Ok(None),
            }
        };
        let (catalog, whitelist, nomenclature) = tokio::join!(
            self.fetch(Resource::Catalog),
            self.fetch(Resource::Whitelist),
            nomenclature
        );
        Ok(RefreshReport {
            catalog: catalog?,
            whitelist: whitelist?,
            nomenclature: nomenclature?,
        })
    }
}

/// Reject content that cannot be the requested resource.
fn check_content(resource: Resource, url: &str, bytes: &[u8]) -> Result<(), ScienceHelperError> {
    match resource {
        Resource::Catalog => {
            if !bytes.starts_with(b"%PDF") {
                let head: Vec<u8> = bytes.iter().copied().take(4).collect();
                return Err(ScienceHelperError::ParseError(format!(
                    "{url} did not return a PDF (first bytes {head:?})"
                )));
            }
        }
        Resource::Whitelist => {
            serde_json::from_slice::<serde_json::Value>(bytes).map_err(|e| {
                ScienceHelperError::ParseError(format!("{url} did not return JSON: {e}"))
            })?;
        }
        Resource::Nomenclature => {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Err(ScienceHelperError::ParseError(format!(
                    "{url} returned an empty page"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve scripted responses on a local port; the last one repeats.
    async fn serve(script: Vec<(u16, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)].clone();
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[derive(Default)]
    struct Events {
        retries: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl RetrievalProgressCallback for Events {
        fn on_retry(&self, _: Resource, _: u32, _: u32, _: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
        fn on_fetch_complete(&self, _: Resource, _: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_fetch_error(&self, _: Resource, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(dir: &std::path::Path, base: &str) -> CatalogConfig {
        CatalogConfig::builder()
            .catalog_url(format!("{base}/files?name=vak_2024"))
            .whitelist_url(format!("{base}/whitelist.json"))
            .data_dir(dir)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn retries_transient_status_then_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (base, hits) = serve(vec![(503, vec![]), (200, b"%PDF-1.7 body".to_vec())]).await;
        let events = Arc::new(Events::default());
        let mut cfg = config(dir.path(), &base);
        cfg.progress_callback = Some(events.clone());

        let fetched = CatalogRetriever::new(&cfg).unwrap().fetch(Resource::Catalog).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(events.retries.load(Ordering::SeqCst), 1);
        assert_eq!(events.completes.load(Ordering::SeqCst), 1);
        assert_eq!(fetched.path, dir.path().join("vak_2024.pdf"));
        assert_eq!(std::fs::read(&fetched.path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (base, hits) = serve(vec![(404, vec![])]).await;
        let err = CatalogRetriever::new(&config(dir.path(), &base))
            .unwrap()
            .fetch(Resource::Catalog)
            .await
            .unwrap_err();
        match err {
            ScienceHelperError::RetrievalError { attempts, source, .. } => {
                assert_eq!(attempts, 1);
                assert!(matches!(source, FetchFailure::Status(404)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (base, hits) = serve(vec![(500, vec![])]).await;
        let events = Arc::new(Events::default());
        let mut cfg = config(dir.path(), &base);
        cfg.progress_callback = Some(events.clone());

        let err = CatalogRetriever::new(&cfg)
            .unwrap()
            .fetch(Resource::Whitelist)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScienceHelperError::RetrievalError { attempts: 3, source: FetchFailure::Status(500), .. }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(events.errors.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("whitelist_articles.json").exists());
    }

    #[tokio::test]
    async fn rejected_content_keeps_previous_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("whitelist_articles.json");
        std::fs::write(&cached, b"[\"old\"]").unwrap();
        let (base, _) = serve(vec![(200, b"<html>maintenance</html>".to_vec())]).await;

        let err = CatalogRetriever::new(&config(dir.path(), &base))
            .unwrap()
            .fetch(Resource::Whitelist)
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceHelperError::ParseError(_)));
        assert_eq!(std::fs::read(&cached).unwrap(), b"[\"old\"]");
    }

    #[tokio::test]
    async fn missing_url_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CatalogConfig::builder().data_dir(dir.path()).build().unwrap();
        let err = CatalogRetriever::new(&cfg)
            .unwrap()
            .fetch(Resource::Nomenclature)
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceHelperError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn ensure_uses_existing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (base, hits) = serve(vec![(200, b"[]".to_vec())]).await;
        let retriever = CatalogRetriever::new(&config(dir.path(), &base)).unwrap();
        let first = retriever.ensure(Resource::Whitelist).await.unwrap();
        let second = retriever.ensure(Resource::Whitelist).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and never answer
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let dir = tempfile::tempdir().unwrap();
        let cfg = CatalogConfig::builder()
            .catalog_url(format!("http://{addr}/vak.pdf"))
            .data_dir(dir.path())
            .max_attempts(1)
            .download_timeout_secs(1)
            .build()
            .unwrap();
        let err = CatalogRetriever::new(&cfg)
            .unwrap()
            .fetch(Resource::Catalog)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScienceHelperError::RetrievalError { source: FetchFailure::Timeout(1), .. }
        ));
    }

    #[tokio::test]
    async fn flight_locks_are_shared_per_cache_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = CatalogRetriever::new(&config(dir.path(), "http://127.0.0.1:9")).unwrap();
        let b = CatalogRetriever::new(&config(dir.path(), "http://127.0.0.1:9")).unwrap();
        let la = flight_lock(&a.cache_path(Resource::Catalog));
        let lb = flight_lock(&b.cache_path(Resource::Catalog));
        assert!(Arc::ptr_eq(&la, &lb));
        let lw = flight_lock(&a.cache_path(Resource::Whitelist));
        assert!(!Arc::ptr_eq(&la, &lw));
    }
}
