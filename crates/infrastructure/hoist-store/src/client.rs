use bytes::Bytes;
use camino::Utf8Path;
use futures::StreamExt;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Listing error: {0}")]
    List(String),
    #[error("Upload error: {0}")]
    Upload(String),
}

/// The storage service as the rest of the system sees it: list keys under
/// a prefix, or push one local file to one key.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object key starting with `prefix`, in the service's listing
    /// order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// The last key observed while listing `prefix`, one page at a time,
    /// without holding the full listing in memory.
    ///
    /// Only meaningful as a cutoff when the service lists keys in
    /// ascending order.
    async fn last_key(&self, prefix: &str) -> Result<Option<String>, StoreError>;

    /// Stream a local file's bytes into the object at `key`, overwriting
    /// any existing object. Returns the number of bytes sent.
    async fn upload_file(&self, local_path: &Utf8Path, key: &str) -> Result<u64, StoreError>;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// JSON-over-HTTP object store client (Cloud-Storage-style API surface).
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    limiter: Option<Arc<DirectLimiter>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectRecord>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectRecord {
    name: String,
}

impl HttpObjectStore {
    pub fn new(
        client: Client,
        endpoint: String,
        bucket: String,
        token: Option<String>,
        rate_limit_bytes: Option<u64>,
    ) -> Self {
        let limiter = rate_limit_bytes.and_then(|bps| {
            NonZeroU32::new(bps as u32)
                .map(|nz| Arc::new(RateLimiter::direct(Quota::per_second(nz))))
        });
        Self {
            client,
            endpoint,
            bucket,
            token,
            limiter,
        }
    }

    fn bucket_segment(&self) -> String {
        utf8_percent_encode(&self.bucket, NON_ALPHANUMERIC).to_string()
    }

    fn objects_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint.trim_end_matches('/'),
            self.bucket_segment()
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint.trim_end_matches('/'),
            self.bucket_segment()
        )
    }

    async fn fetch_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if !prefix.is_empty() {
            query.push(("prefix", prefix));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let mut request = self.client.get(self.objects_url()).query(&query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| StoreError::List(format!("listing request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::List(format!(
                "listing returned {}",
                resp.status()
            )));
        }
        resp.json::<ListPage>()
            .await
            .map_err(|e| StoreError::List(format!("listing parse failed: {e}")))
    }
}

#[async_trait::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(prefix, page_token.as_deref()).await?;
            keys.extend(
                page.items
                    .into_iter()
                    .map(|record| record.name)
                    // Directory placeholders are not uploadable objects.
                    .filter(|name| !name.is_empty() && !name.ends_with('/')),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn last_key(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        let mut last = None;
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(prefix, page_token.as_deref()).await?;
            if let Some(record) = page
                .items
                .into_iter()
                .filter(|record| !record.name.is_empty() && !record.name.ends_with('/'))
                .last()
            {
                last = Some(record.name);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(last)
    }

    async fn upload_file(&self, local_path: &Utf8Path, key: &str) -> Result<u64, StoreError> {
        let file = File::open(local_path.as_std_path())
            .await
            .map_err(|e| StoreError::Upload(format!("open {local_path} failed: {e}")))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StoreError::Upload(format!("stat {local_path} failed: {e}")))?
            .len();

        let limiter = self.limiter.clone();
        let body_stream = ReaderStream::new(file).then(move |chunk: Result<Bytes, _>| {
            let limiter = limiter.clone();
            async move {
                if let (Ok(bytes), Some(l)) = (&chunk, &limiter) {
                    if let Some(nz) = NonZeroU32::new(bytes.len() as u32) {
                        l.until_n_ready(nz).await.ok();
                    }
                }
                chunk
            }
        });

        let mut request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body_stream));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| StoreError::Upload(format!("upload request for {key} failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(StoreError::Upload(format!(
                "upload of {key} returned {status}: {detail}"
            )));
        }

        info!("File {} uploaded to {}.", local_path, key);
        Ok(size)
    }
}
