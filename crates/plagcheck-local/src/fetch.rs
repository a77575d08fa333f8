use crate::config::FetchConfig;
use crate::extract::visible_text_from_body;
use plagcheck_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// reqwest-backed [`FetchBackend`] with a browser-like User-Agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Per-request timeouts (FetchRequest.timeout_ms) still apply on top.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    /// Shared client, so search providers reuse the same pool.
    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn apply_headers(
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                rb = rb.header(name, value);
            }
        }
        rb
    }
}

#[async_trait::async_trait]
impl FetchBackend for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let t0 = Instant::now();
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = Self::apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("fetch".to_string(), t0.elapsed().as_millis());
        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            truncated,
            timings_ms,
        })
    }
}

/// Fetches a URL and reduces it to visible text. Never fails: transport
/// errors and non-200 statuses yield an empty string.
#[derive(Clone)]
pub struct PageFetcher {
    backend: Arc<dyn FetchBackend>,
    timeout_ms: u64,
    max_bytes: u64,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("timeout_ms", &self.timeout_ms)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

impl PageFetcher {
    pub fn new(backend: Arc<dyn FetchBackend>, cfg: &FetchConfig) -> Self {
        Self {
            backend,
            timeout_ms: cfg.timeout_ms,
            max_bytes: cfg.max_bytes,
        }
    }

    /// Visible text with case preserved (sentence boundaries depend on it).
    pub async fn fetch_visible_text(&self, url: &str) -> String {
        let mut req = FetchRequest::new(url);
        req.timeout_ms = Some(self.timeout_ms);
        req.max_bytes = Some(self.max_bytes);

        match self.backend.fetch(&req).await {
            Ok(resp) if resp.status == 200 => {
                let text = visible_text_from_body(resp.content_type.as_deref(), &resp.text_lossy());
                tracing::debug!(
                    url,
                    chars = text.len(),
                    truncated = resp.truncated,
                    "page fetched"
                );
                text
            }
            Ok(resp) => {
                tracing::debug!(url, status = resp.status, "page skipped: non-200 status");
                String::new()
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "page skipped: fetch failed");
                String::new()
            }
        }
    }

    /// Visible text, whitespace-collapsed and lower-cased.
    pub async fn fetch_text(&self, url: &str) -> String {
        self.fetch_visible_text(url).await.to_lowercase()
    }
}
