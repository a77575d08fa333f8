//! Engine configuration: serde-defaulted sections loaded from optional TOML.
//!
//! Secrets (search API keys) are read from the environment by the providers,
//! never from this file.

use plagcheck_core::{AggregationPolicy, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub matching: MatchingConfig,
    pub encoder: EncoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_words: usize,
    pub min_chunk_words: usize,
    pub max_chunks: usize,
    /// Texts shorter than this (trimmed chars) are not scanned.
    pub min_document_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_words: crate::segment::SEARCH_CHUNK_WORDS,
            min_chunk_words: 10,
            max_chunks: 3,
            min_document_chars: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// serper | searxng | disabled
    pub provider: String,
    pub results_per_query: usize,
    pub query_max_chars: usize,
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "serper".to_string(),
            results_per_query: 5,
            query_max_chars: 200,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub max_bytes: u64,
    /// Pages with less extracted text than this are skipped.
    pub min_page_chars: usize,
    /// Use the search snippet when the page itself is unusable.
    pub snippet_fallback: bool,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            max_bytes: 5_000_000,
            min_page_chars: 200,
            snippet_fallback: false,
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Page prefix compared against the whole chunk by the relevance gate.
    pub coarse_prefix_chars: usize,
    /// Percentage; pages below it are abandoned for the chunk.
    pub relevance_threshold: f64,
    pub ngram_n: usize,
    /// Fraction in [0, 1]; sentence pairs below it skip semantic scoring.
    pub ngram_threshold: f64,
    pub max_page_sentences: usize,
    pub ngram_weight: f64,
    pub semantic_weight: f64,
    /// Percentage; best sentence scores at or above it become matches.
    pub match_threshold: f64,
    pub aggregation: AggregationPolicy,
    /// URLs fetched and matched concurrently within one chunk.
    pub max_concurrency: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            coarse_prefix_chars: 2_000,
            relevance_threshold: 35.0,
            ngram_n: crate::ngram::DEFAULT_N,
            ngram_threshold: 0.05,
            max_page_sentences: 100,
            ngram_weight: 0.4,
            semantic_weight: 0.6,
            match_threshold: 60.0,
            aggregation: AggregationPolicy::Mean,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// hashing | fastembed
    pub backend: String,
    pub model: String,
    pub batch_size: usize,
    pub hashing_dims: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: "hashing".to_string(),
            model: "all-minilm-l6-v2".to_string(),
            batch_size: 32,
            hashing_dims: 384,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        fn bad(msg: &str) -> Result<()> {
            Err(Error::Config(msg.to_string()))
        }
        let pct = 0.0..=100.0;
        let unit = 0.0..=1.0;

        if self.chunking.chunk_words == 0 {
            return bad("chunking.chunk_words must be > 0");
        }
        if self.chunking.max_chunks == 0 {
            return bad("chunking.max_chunks must be > 0");
        }
        if self.search.results_per_query == 0 {
            return bad("search.results_per_query must be > 0");
        }
        if self.search.query_max_chars == 0 {
            return bad("search.query_max_chars must be > 0");
        }
        if self.matching.ngram_n == 0 {
            return bad("matching.ngram_n must be > 0");
        }
        if self.matching.max_concurrency == 0 {
            return bad("matching.max_concurrency must be > 0");
        }
        if !pct.contains(&self.matching.relevance_threshold)
            || !pct.contains(&self.matching.match_threshold)
        {
            return bad("matching thresholds must be in [0, 100]");
        }
        if !unit.contains(&self.matching.ngram_threshold) {
            return bad("matching.ngram_threshold must be in [0.0, 1.0]");
        }
        if !unit.contains(&self.matching.ngram_weight)
            || !unit.contains(&self.matching.semantic_weight)
        {
            return bad("matching weights must be in [0.0, 1.0]");
        }
        if self.matching.ngram_weight + self.matching.semantic_weight > 1.0 + 1e-9 {
            return bad("matching.ngram_weight + matching.semantic_weight must be <= 1.0");
        }
        if self.encoder.batch_size == 0 || self.encoder.hashing_dims == 0 {
            return bad("encoder.batch_size and encoder.hashing_dims must be > 0");
        }
        match self.search.provider.trim().to_ascii_lowercase().as_str() {
            "serper" | "searxng" | "disabled" => {}
            _ => return bad("search.provider must be serper, searxng, or disabled"),
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig =
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    parse_config(&content)
}
