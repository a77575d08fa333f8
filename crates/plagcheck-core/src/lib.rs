use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Optional headers to add (best-effort; adapter may drop unsafe headers).
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            max_bytes: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

/// HTTP GET collaborator used by the page fetcher.
#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results: Some(max_results),
            language: None,
            country: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

impl SearchResult {
    /// De-duplication key for a scan: the URL without its fragment.
    ///
    /// Falls back to the trimmed raw string when the URL does not parse.
    pub fn canonical_url(&self) -> String {
        match url::Url::parse(self.url.trim()) {
            Ok(mut u) => {
                u.set_fragment(None);
                u.to_string()
            }
            Err(_) => self.url.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub cost_units: u64,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Sentence-embedding backend.
///
/// Implementations are loaded once and shared read-only across scans; `encode`
/// is CPU-bound and callers run it off the async executor.
pub trait SentenceEncoder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    /// One vector per input text, in input order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A word-bounded slice of a document used as a search query and comparison unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    /// Index of the first word within the document.
    pub word_offset: usize,
    /// Byte offset of the first word within the document text.
    pub byte_offset: usize,
    pub word_count: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    /// Matched against the fetched page body.
    Page,
    /// Matched against the search snippet (page was unusable).
    Snippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub source: String,
    pub query_text: String,
    pub matched_text: String,
    /// Combined sentence score in [0, 100].
    pub score: f64,
    pub origin: MatchOrigin,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Unique,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Unique => "Unique",
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairwiseLevel {
    Low,
    Medium,
    High,
}

impl PairwiseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairwiseLevel::Low => "Low",
            PairwiseLevel::Medium => "Medium",
            PairwiseLevel::High => "High",
        }
    }
}

/// How the internet overall score is derived from accepted matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    #[default]
    Mean,
    Max,
}

impl std::str::FromStr for AggregationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(AggregationPolicy::Mean),
            "max" => Ok(AggregationPolicy::Max),
            other => Err(Error::Config(format!(
                "unknown aggregation policy {other:?} (expected mean or max)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub overall_score: f64,
    pub level: RiskLevel,
    /// Descending by score; ties keep discovery order.
    pub matches: Vec<Match>,
    pub sources_checked: usize,
    pub sources_matched: usize,
    pub document_sha256: String,
    pub warnings: Vec<String>,
}

impl ScanResult {
    pub fn empty(document_sha256: String) -> Self {
        Self {
            overall_score: 0.0,
            level: RiskLevel::Unique,
            matches: Vec::new(),
            sources_checked: 0,
            sources_matched: 0,
            document_sha256,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, code: &str) -> Self {
        self.warnings.push(code.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub tfidf: f64,
    pub jaccard: f64,
    pub sequence: f64,
    pub combined: f64,
    pub level: PairwiseLevel,
    pub a_sha256: String,
    pub b_sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: None,
            snippet: None,
            source: "test".to_string(),
        }
    }

    #[test]
    fn canonical_url_drops_fragment() {
        let r = result("https://example.com/essay#part-2");
        assert_eq!(r.canonical_url(), "https://example.com/essay");
    }

    #[test]
    fn canonical_url_keeps_unparseable_input() {
        let r = result("  not a url ");
        assert_eq!(r.canonical_url(), "not a url");
    }

    #[test]
    fn aggregation_policy_parses_case_insensitively() {
        assert_eq!(
            "MAX".parse::<AggregationPolicy>().unwrap(),
            AggregationPolicy::Max
        );
        assert_eq!(
            " mean ".parse::<AggregationPolicy>().unwrap(),
            AggregationPolicy::Mean
        );
        assert!("median".parse::<AggregationPolicy>().is_err());
    }

    #[test]
    fn scan_result_serializes_levels_by_name() {
        let r = ScanResult::empty("00".to_string()).with_warning("document_too_short");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["level"], "Unique");
        assert_eq!(v["overall_score"], 0.0);
        assert_eq!(v["sources_checked"], 0);
        assert_eq!(v["warnings"][0], "document_too_short");
        assert!(v["matches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn match_origin_is_snake_case() {
        let m = Match {
            source: "https://example.com".to_string(),
            query_text: "a".to_string(),
            matched_text: "b".to_string(),
            score: 61.5,
            origin: MatchOrigin::Snippet,
            chunk_index: 0,
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["origin"], "snippet");
    }
}
