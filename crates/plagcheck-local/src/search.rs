use crate::config::SearchConfig;
use plagcheck_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

const SERPER_DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(10_000).clamp(500, 60_000)
}

fn serper_api_key_from_env() -> Option<String> {
    std::env::var("PLAGCHECK_SERPER_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("SERPER_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn serper_endpoint_from_env() -> Option<String> {
    std::env::var("PLAGCHECK_SERPER_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn searxng_endpoint_from_env() -> Option<String> {
    std::env::var("PLAGCHECK_SEARXNG_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn elapsed_timings(t0: Instant) -> BTreeMap<String, u128> {
    let mut timings_ms = BTreeMap::new();
    timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
    timings_ms
}

/// Google results through the Serper API (`POST {q, num}`, `X-API-KEY` header).
#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing PLAGCHECK_SERPER_API_KEY (or SERPER_API_KEY)".to_string(),
            )
        })?;
        let endpoint =
            serper_endpoint_from_env().unwrap_or_else(|| SERPER_DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let num = q.max_results.unwrap_or(5).clamp(1, 100);
        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: q.query.as_str(),
                num,
            })
            .timeout(std::time::Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }
        let parsed: SerperResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let results = parsed
            .organic
            .into_iter()
            .filter_map(|r| {
                let url = r.link.filter(|u| !u.trim().is_empty())?;
                Some(SearchResult {
                    url,
                    title: r.title,
                    snippet: r.snippet,
                    source: "serper".to_string(),
                })
            })
            .take(num)
            .collect();

        Ok(SearchResponse {
            results,
            provider: "serper".to_string(),
            cost_units: 1,
            timings_ms: elapsed_timings(t0),
        })
    }
}

/// Self-hosted SearXNG instance (`GET /search?format=json`).
#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl SearxngSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = searxng_endpoint_from_env().ok_or_else(|| {
            Error::NotConfigured("missing PLAGCHECK_SEARXNG_ENDPOINT".to_string())
        })?;
        Ok(Self::with_endpoint(client, endpoint))
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn endpoint_search(&self) -> String {
        // Accept either a base URL or a full /search endpoint.
        let mut base = self.endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(5).min(20);
        let mut req = self
            .client
            .get(self.endpoint_search())
            .query(&[("q", q.query.as_str()), ("format", "json")]);
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("language", lang)]);
        }
        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("searxng search HTTP {status}")));
        }
        let parsed: SearxngSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let mut out = Vec::new();
        for r in parsed.results.unwrap_or_default().into_iter() {
            if out.len() >= max_results {
                break;
            }
            let Some(url) = r.url else { continue };
            out.push(SearchResult {
                url,
                title: r.title,
                snippet: r.content,
                source: "searxng".to_string(),
            });
        }

        Ok(SearchResponse {
            results: out,
            provider: "searxng".to_string(),
            cost_units: 0,
            timings_ms: elapsed_timings(t0),
        })
    }
}

/// Provider named by `search.provider`.
///
/// `Ok(None)` means search is disabled or its credentials are absent; the
/// scan then reports `search_not_configured` instead of failing.
pub fn search_provider_from_config(
    cfg: &SearchConfig,
    client: reqwest::Client,
) -> Result<Option<Arc<dyn SearchProvider>>> {
    let provider: Result<Arc<dyn SearchProvider>> =
        match cfg.provider.trim().to_ascii_lowercase().as_str() {
            "disabled" => return Ok(None),
            "serper" => SerperSearchProvider::from_env(client).map(|p| Arc::new(p) as Arc<dyn SearchProvider>),
            "searxng" => SearxngSearchProvider::from_env(client).map(|p| Arc::new(p) as Arc<dyn SearchProvider>),
            other => {
                return Err(Error::Config(format!(
                    "unknown search provider {other:?}"
                )))
            }
        };
    match provider {
        Ok(p) => Ok(Some(p)),
        Err(Error::NotConfigured(msg)) => {
            tracing::warn!(provider = %cfg.provider, reason = %msg, "web search not configured");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Fail-open search: any provider error yields an empty result list.
#[derive(Clone)]
pub struct WebSourceSearcher {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    query_max_chars: usize,
    timeout_ms: u64,
}

impl std::fmt::Debug for WebSourceSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSourceSearcher")
            .field("provider", &self.provider.name())
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl WebSourceSearcher {
    pub fn new(provider: Arc<dyn SearchProvider>, cfg: &SearchConfig) -> Self {
        Self {
            provider,
            max_results: cfg.results_per_query.max(1),
            query_max_chars: cfg.query_max_chars.max(1),
            timeout_ms: cfg.timeout_ms,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Query text actually sent: whitespace-collapsed chunk prefix.
    pub fn query_for(&self, chunk_text: &str) -> String {
        let collapsed = crate::textprep::norm_ws(chunk_text);
        crate::textprep::truncate_chars(&collapsed, self.query_max_chars).to_string()
    }

    /// At most `results_per_query` results; empty on any failure.
    pub async fn search(&self, chunk_text: &str) -> Vec<SearchResult> {
        let query = self.query_for(chunk_text);
        if query.is_empty() {
            return Vec::new();
        }
        let mut q = SearchQuery::new(query, self.max_results);
        q.timeout_ms = Some(self.timeout_ms);
        match self.provider.search(&q).await {
            Ok(resp) => {
                tracing::debug!(
                    provider = resp.provider,
                    results = resp.results.len(),
                    "search completed"
                );
                resp.results.into_iter().take(self.max_results).collect()
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "search failed; continuing without results");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    struct EnvGuard {
        k: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(k: &'static str, v: &str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::set_var(k, v);
            Self { k, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(v) = self.prev.take() {
                std::env::set_var(self.k, v);
            } else {
                std::env::remove_var(self.k);
            }
        }
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn searcher_for(addr: SocketAddr, path: &str) -> WebSourceSearcher {
        let p = SerperSearchProvider::with_endpoint(
            reqwest::Client::new(),
            "test-key",
            format!("http://{addr}{path}"),
        );
        WebSourceSearcher::new(Arc::new(p), &SearchConfig::default())
    }

    #[test]
    fn empty_api_keys_are_treated_as_missing() {
        let _g1 = EnvGuard::set("PLAGCHECK_SERPER_API_KEY", "");
        let _g2 = EnvGuard::set("SERPER_API_KEY", "   ");
        assert!(serper_api_key_from_env().is_none());
    }

    #[test]
    fn parses_minimal_serper_shape() {
        let js = r#"
        {
          "searchParameters": {"q": "hello"},
          "organic": [
            {"title":"Example","link":"https://example.com","snippet":"Hello","position":1},
            {"title":"No link"}
          ]
        }
        "#;
        let parsed: SerperResponse = serde_json::from_str(js).unwrap();
        assert_eq!(parsed.organic.len(), 2);
        assert_eq!(parsed.organic[0].link.as_deref(), Some("https://example.com"));
        assert_eq!(parsed.organic[0].snippet.as_deref(), Some("Hello"));
        assert!(parsed.organic[1].link.is_none());
    }

    #[test]
    fn serper_response_without_organic_is_empty() {
        let parsed: SerperResponse = serde_json::from_str(r#"{"answerBox":{}}"#).unwrap();
        assert!(parsed.organic.is_empty());
    }

    #[test]
    fn parses_minimal_searxng_shape() {
        let js = r#"
        {
          "results": [
            {"url":"https://example.com","title":"Example","content":"Hello"}
          ]
        }
        "#;
        let parsed: SearxngSearchResponse = serde_json::from_str(js).unwrap();
        assert_eq!(parsed.results.unwrap().len(), 1);
    }

    #[test]
    fn searxng_accepts_base_or_search_endpoint() {
        let c = reqwest::Client::new();
        let a = SearxngSearchProvider::with_endpoint(c.clone(), "http://s.local/");
        let b = SearxngSearchProvider::with_endpoint(c, "http://s.local/search");
        assert_eq!(a.endpoint_search(), "http://s.local/search");
        assert_eq!(b.endpoint_search(), "http://s.local/search");
    }

    #[test]
    fn query_is_whitespace_collapsed_prefix() {
        let p = SearxngSearchProvider::with_endpoint(reqwest::Client::new(), "http://x");
        let cfg = SearchConfig {
            query_max_chars: 11,
            ..SearchConfig::default()
        };
        let s = WebSourceSearcher::new(Arc::new(p), &cfg);
        assert_eq!(s.query_for("  alpha\n\nbeta   gamma delta"), "alpha beta ");
    }

    #[test]
    fn disabled_provider_yields_none() {
        let cfg = SearchConfig {
            provider: "disabled".to_string(),
            ..SearchConfig::default()
        };
        assert!(search_provider_from_config(&cfg, reqwest::Client::new())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn serper_posts_query_and_key_and_maps_organic() {
        let app = Router::new().route(
            "/search",
            post(
                |headers: axum::http::HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(
                        headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                        Some("test-key")
                    );
                    assert_eq!(body["num"], 5);
                    let q = body["q"].as_str().unwrap_or_default().to_string();
                    Json(serde_json::json!({
                        "organic": [
                            {"title": "T1", "link": "https://a.example/1", "snippet": q},
                            {"title": "T2", "link": "https://b.example/2", "snippet": "s2"}
                        ]
                    }))
                },
            ),
        );
        let addr = serve(app).await;
        let results = searcher_for(addr, "/search").search("photosynthesis in plants").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://a.example/1");
        assert_eq!(results[0].snippet.as_deref(), Some("photosynthesis in plants"));
        assert_eq!(results[0].source, "serper");
    }

    #[tokio::test]
    async fn searcher_fails_open_on_http_error_and_bad_body() {
        let app = Router::new()
            .route(
                "/down",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "nope") }),
            )
            .route("/garbage", post(|| async { "not json" }));
        let addr = serve(app).await;
        assert!(searcher_for(addr, "/down").search("some query").await.is_empty());
        assert!(searcher_for(addr, "/garbage").search("some query").await.is_empty());
    }
}
