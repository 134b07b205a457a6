//! Collaborator seams for the poller: HTTP transport, raw-body cache and flight file store.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub use reqwest::{StatusCode, Url};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache write for {key} failed: {message}")]
    Cache { key: String, message: String },
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Ordered request headers sent with every feed and detail request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderProfile {
    headers: Vec<(String, String)>,
}

impl HeaderProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Header set of a desktop Chrome session browsing the public flight map.
    pub fn browser(user_agent: &str) -> Self {
        Self::empty()
            .with("accept-encoding", "gzip, br")
            .with("accept-language", "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7")
            .with("cache-control", "max-age=0")
            .with("origin", "https://www.flightradar24.com")
            .with("referer", "https://www.flightradar24.com/")
            .with("sec-fetch-dest", "empty")
            .with("sec-fetch-mode", "cors")
            .with("sec-fetch-site", "same-site")
            .with("user-agent", user_agent)
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// GET capability. Cookie handling and client fingerprinting live behind this seam.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: &HeaderProfile) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            follow_redirects: false,
        }
    }
}

/// reqwest-backed client with a shared cookie jar, so clearance cookies set by the feed's
/// edge are replayed on later requests.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .redirect(redirect)
            .timeout(config.timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &HeaderProfile) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.bytes().await?.to_vec();
        debug!(url, status = status.as_u16(), bytes = body.len(), "http response");

        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(20, Duration::from_secs(3))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
        }
    }

    /// Pause after the failed attempt `attempt_index` (zero-based). Doubles from `base_delay`
    /// and saturates at `max_delay`; equal bounds give a fixed interval.
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

/// Key/blob cache with no expiry. Writes are best-effort from the poller's point of view.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set(&self, key: &str, blob: &[u8]) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct RedisCacheStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).with_context(|| format!("parsing redis url {url}"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("connecting to redis at {url}"))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn set(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, blob)
            .await
            .map_err(|err| StorageError::Cache {
                key: key.to_string(),
                message: err.to_string(),
            })
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn set(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}

/// Directory-per-key blob store.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create `<root>/<key>` if absent. Never fails because the directory already exists.
    async fn ensure_dir(&self, key: &str) -> Result<PathBuf, StorageError>;

    /// Write `blob` to `<root>/<key>/<file_name>`, replacing any previous file.
    async fn write(&self, key: &str, file_name: &str, blob: &[u8]) -> Result<PathBuf, StorageError>;
}

#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StorageError::io("creating data root", &self.root, err))
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn ensure_dir(&self, key: &str) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| StorageError::io("creating directory", &dir, err))?;
        Ok(dir)
    }

    async fn write(&self, key: &str, file_name: &str, blob: &[u8]) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(key);
        let path = dir.join(file_name);
        let temp_path = dir.join(format!(".{}.{}.tmp", Uuid::new_v4(), blob.len()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(|err| StorageError::io("opening temp file", &temp_path, err))?;
        let written = async {
            file.write_all(blob).await?;
            file.flush().await
        }
        .await;
        drop(file);
        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io("writing temp file", &temp_path, err));
        }

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::io("renaming temp file onto", &path, err));
        }
        Ok(path)
    }
}
