use super::types::OpenApiDocument;
use crate::config::TlsOptions;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error types for spec retrieval and API calls
#[derive(Debug, thiserror::Error)]
pub enum OpenApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetching {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Invalid OpenAPI document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Unknown operation '{name}' in environment '{environment}'")]
    UnknownOperation { environment: String, name: String },

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// One cached document per spec URL
struct CachedSpec {
    document: Arc<OpenApiDocument>,
    fetched_at: DateTime<Utc>,
}

/// Fetches OpenAPI documents and keeps recent ones in an LRU cache
pub struct SpecClient {
    http_client: reqwest::Client,
    cache: Mutex<LruCache<String, CachedSpec>>,
    ttl: Duration,
}

impl SpecClient {
    pub fn new(tls: TlsOptions, timeout: Duration, ttl: Duration) -> Result<Self, OpenApiError> {
        if tls.accept_invalid_certs {
            warn!("TLS certificate verification disabled for outbound requests");
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("openapi-mcp-server/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .danger_accept_invalid_certs(tls.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http_client,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(32).unwrap_or(NonZeroUsize::MIN))),
            ttl,
        })
    }

    /// Client shared with upstream API calls, so both follow the same TLS policy
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Return the document at `spec_url`, from cache when still fresh
    pub async fn fetch(&self, spec_url: &str) -> Result<Arc<OpenApiDocument>, OpenApiError> {
        if let Some(document) = self.cached(spec_url) {
            debug!(spec_url = %spec_url, "Spec cache hit");
            return Ok(document);
        }

        debug!(spec_url = %spec_url, "Spec cache miss, fetching document");
        let response = self.http_client.get(spec_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(spec_url = %spec_url, status = status.as_u16(), "Spec fetch failed");
            return Err(OpenApiError::Status {
                status: status.as_u16(),
                url: spec_url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let document = Arc::new(OpenApiDocument::from_slice(&bytes)?);

        info!(
            spec_url = %spec_url,
            title = %document.info.title,
            paths = document.paths.len(),
            "Loaded OpenAPI document"
        );

        self.lock_cache().put(
            spec_url.to_string(),
            CachedSpec {
                document: Arc::clone(&document),
                fetched_at: Utc::now(),
            },
        );

        Ok(document)
    }

    /// Drop the cached copy of `spec_url`
    pub fn invalidate(&self, spec_url: &str) {
        self.lock_cache().pop(spec_url);
    }

    fn cached(&self, spec_url: &str) -> Option<Arc<OpenApiDocument>> {
        let mut cache = self.lock_cache();
        let entry = cache.get(spec_url)?;

        let age = Utc::now()
            .signed_duration_since(entry.fetched_at)
            .to_std()
            .unwrap_or_default();
        if age < self.ttl {
            return Some(Arc::clone(&entry.document));
        }

        cache.pop(spec_url);
        None
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LruCache<String, CachedSpec>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
