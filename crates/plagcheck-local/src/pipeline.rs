//! Internet scan: chunk, search, fetch, then a relevance gate, an n-gram gate
//! and sentence-level semantic scoring per page.
//!
//! Chunks are processed in order, one at a time. Within a chunk, candidate URLs
//! are fetched and scored concurrently (bounded by `matching.max_concurrency`)
//! and their outcomes are collected in search-result order, so the match list is
//! deterministic for a given set of provider responses.
//!
//! `scan` never fails. Provider errors, dead pages and encoder failures only
//! remove candidates; a missing search provider short-circuits to an empty
//! result with a `search_not_configured` warning.

use crate::aggregate;
use crate::config::{ChunkingConfig, EngineConfig, FetchConfig, MatchingConfig};
use crate::document::Document;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::ngram::ngram_overlap;
use crate::search::{search_provider_from_config, WebSourceSearcher};
use crate::segment::{split_into_chunks, split_into_sentences};
use crate::semantic::{cosine_similarity, cosine_to_percent, encoder_from_config, SemanticScorer};
use crate::textprep::{norm_ws, truncate_chars};
use futures_util::StreamExt;
use plagcheck_core::{Chunk, Match, MatchOrigin, Result, ScanResult, SearchResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const WARN_DOCUMENT_TOO_SHORT: &str = "document_too_short";
pub const WARN_SEARCH_NOT_CONFIGURED: &str = "search_not_configured";
pub const WARN_SCAN_CANCELLED: &str = "scan_cancelled";
pub const WARN_DEADLINE_EXCEEDED: &str = "deadline_exceeded";

/// Cancellation and deadline for one scan.
///
/// Checked between chunks and before each URL, and raced against in-flight
/// search and fetch calls. An interrupted scan returns what it has so far.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancel: CancellationToken,
    deadline: Option<tokio::time::Instant>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deadline relative to now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(tokio::time::Instant::now() + timeout);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Warning code if the scan should stop now.
    pub fn interruption(&self) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            return Some(WARN_SCAN_CANCELLED);
        }
        match self.deadline {
            Some(d) if tokio::time::Instant::now() >= d => Some(WARN_DEADLINE_EXCEEDED),
            _ => None,
        }
    }

    /// Resolves once cancelled or past the deadline.
    async fn interrupted(&self) -> &'static str {
        match self.deadline {
            Some(d) => tokio::select! {
                _ = self.cancel.cancelled() => WARN_SCAN_CANCELLED,
                _ = tokio::time::sleep_until(d) => WARN_DEADLINE_EXCEEDED,
            },
            None => {
                self.cancel.cancelled().await;
                WARN_SCAN_CANCELLED
            }
        }
    }
}

/// Sentence-level matching of one chunk against one page. Synchronous and
/// CPU-bound; the pipeline runs it on the blocking pool.
#[derive(Debug, Clone)]
struct PageMatcher {
    semantic: SemanticScorer,
    cfg: MatchingConfig,
}

impl PageMatcher {
    fn match_page(
        &self,
        chunk: &Chunk,
        source: &str,
        page: &str,
        origin: MatchOrigin,
    ) -> Vec<Match> {
        let prefix = truncate_chars(page, self.cfg.coarse_prefix_chars);
        let relevance = self.semantic.similarity(&chunk.text, prefix);
        if relevance < self.cfg.relevance_threshold {
            tracing::debug!(source, chunk = chunk.index, relevance, "page below relevance gate");
            return Vec::new();
        }

        let chunk_sentences = split_into_sentences(&chunk.text);
        let page_sentences: Vec<String> = split_into_sentences(page)
            .into_iter()
            .take(self.cfg.max_page_sentences)
            .collect();
        if chunk_sentences.is_empty() || page_sentences.is_empty() {
            return Vec::new();
        }

        // (chunk sentence, page sentence) pairs that pass the n-gram gate.
        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for (ci, cs) in chunk_sentences.iter().enumerate() {
            for (pi, ps) in page_sentences.iter().enumerate() {
                let ng = ngram_overlap(cs, ps, self.cfg.ngram_n);
                if ng >= self.cfg.ngram_threshold {
                    candidates.push((ci, pi, ng));
                }
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        // One batch covering every sentence that survived the gate.
        let mut slots: BTreeMap<(bool, usize), usize> = BTreeMap::new();
        let mut batch: Vec<String> = Vec::new();
        for &(ci, pi, _) in &candidates {
            for (key, text) in [
                ((false, ci), &chunk_sentences[ci]),
                ((true, pi), &page_sentences[pi]),
            ] {
                slots.entry(key).or_insert_with(|| {
                    batch.push(text.clone());
                    batch.len() - 1
                });
            }
        }
        let embeddings = self.semantic.embed(&batch);
        let semantic_of = |ci: usize, pi: usize| -> f64 {
            let (Some(v), Some(&a), Some(&b)) = (
                embeddings.as_ref(),
                slots.get(&(false, ci)),
                slots.get(&(true, pi)),
            ) else {
                return 0.0;
            };
            cosine_to_percent(cosine_similarity(&v[a], &v[b]))
        };

        // Best page sentence per chunk sentence; the first one wins ties.
        let mut best: Vec<Option<(f64, usize)>> = vec![None; chunk_sentences.len()];
        for &(ci, pi, ng) in &candidates {
            let combined = ng * 100.0 * self.cfg.ngram_weight
                + semantic_of(ci, pi) * self.cfg.semantic_weight;
            let better = match best[ci] {
                Some((score, _)) => combined > score,
                None => combined > 0.0,
            };
            if better {
                best[ci] = Some((combined, pi));
            }
        }

        best.into_iter()
            .enumerate()
            .filter_map(|(ci, b)| {
                let (score, pi) = b?;
                if score < self.cfg.match_threshold {
                    return None;
                }
                Some(Match {
                    source: source.to_string(),
                    query_text: chunk_sentences[ci].clone(),
                    matched_text: page_sentences[pi].clone(),
                    score: aggregate::round2(score.clamp(0.0, 100.0)),
                    origin,
                    chunk_index: chunk.index,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct SourceOutcome {
    attempted: bool,
    matches: Vec<Match>,
    interrupted: Option<&'static str>,
}

/// Web-wide plagiarism scan over a search provider and the open web.
#[derive(Debug, Clone)]
pub struct InternetMatchPipeline {
    searcher: Option<WebSourceSearcher>,
    fetcher: PageFetcher,
    matcher: PageMatcher,
    chunking: ChunkingConfig,
    fetch: FetchConfig,
}

impl InternetMatchPipeline {
    pub fn new(
        searcher: Option<WebSourceSearcher>,
        fetcher: PageFetcher,
        semantic: SemanticScorer,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            matcher: PageMatcher {
                semantic,
                cfg: cfg.matching.clone(),
            },
            chunking: cfg.chunking.clone(),
            fetch: cfg.fetch.clone(),
        }
    }

    /// HTTP fetcher, configured search provider (if credentials are present)
    /// and the configured encoder, loaded once.
    pub fn from_config(cfg: &EngineConfig) -> Result<Self> {
        cfg.validate()?;
        let http = HttpFetcher::new(&cfg.fetch.user_agent)?;
        let searcher = search_provider_from_config(&cfg.search, http.client())?
            .map(|p| WebSourceSearcher::new(p, &cfg.search));
        let semantic = SemanticScorer::new(encoder_from_config(&cfg.encoder)?);
        let fetcher = PageFetcher::new(Arc::new(http), &cfg.fetch);
        Ok(Self::new(searcher, fetcher, semantic, cfg))
    }

    pub fn search_provider(&self) -> Option<&'static str> {
        self.searcher.as_ref().map(|s| s.provider_name())
    }

    pub fn encoder_model(&self) -> &str {
        self.matcher.semantic.model_name()
    }

    pub async fn scan(&self, text: &str, ctl: &ScanControl) -> ScanResult {
        let doc = Document::new(text);
        let sha = doc.sha256();

        if doc.text().trim().chars().count() < self.chunking.min_document_chars {
            return ScanResult::empty(sha).with_warning(WARN_DOCUMENT_TOO_SHORT);
        }
        let Some(searcher) = self.searcher.as_ref() else {
            return ScanResult::empty(sha).with_warning(WARN_SEARCH_NOT_CONFIGURED);
        };

        let chunks = split_into_chunks(
            doc.text(),
            self.chunking.chunk_words,
            self.chunking.min_chunk_words,
            self.chunking.max_chunks,
        );
        tracing::info!(
            chunks = chunks.len(),
            provider = searcher.provider_name(),
            "internet scan started"
        );

        let mut seen: HashSet<String> = HashSet::new();
        let mut matches: Vec<Match> = Vec::new();
        let mut sources_checked = 0usize;
        let mut interrupted: Option<&'static str> = None;

        for chunk in &chunks {
            if let Some(w) = ctl.interruption() {
                interrupted = Some(w);
                break;
            }
            let results = tokio::select! {
                r = searcher.search(&chunk.text) => r,
                w = ctl.interrupted() => {
                    interrupted = Some(w);
                    break;
                }
            };
            let fresh: Vec<SearchResult> = results
                .into_iter()
                .filter(|r| seen.insert(r.canonical_url()))
                .collect();
            tracing::debug!(chunk = chunk.index, urls = fresh.len(), "candidate sources");

            let outcomes: Vec<SourceOutcome> = futures_util::stream::iter(fresh)
                .map(|r| self.check_source(chunk, r, ctl))
                .buffered(self.matcher.cfg.max_concurrency.max(1))
                .collect()
                .await;
            for o in outcomes {
                if o.attempted {
                    sources_checked += 1;
                }
                matches.extend(o.matches);
                if interrupted.is_none() {
                    interrupted = o.interrupted;
                }
            }
            if interrupted.is_some() {
                break;
            }
        }

        aggregate::sort_matches(&mut matches);
        let overall_score = aggregate::internet_score(&matches, self.matcher.cfg.aggregation);
        let mut result = ScanResult {
            overall_score,
            level: aggregate::classify_internet(overall_score),
            sources_matched: aggregate::sources_matched(&matches),
            matches,
            sources_checked,
            document_sha256: sha,
            warnings: Vec::new(),
        };
        if let Some(w) = interrupted {
            tracing::warn!(reason = w, "internet scan interrupted; returning partial result");
            result = result.with_warning(w);
        }
        tracing::info!(
            score = result.overall_score,
            level = result.level.as_str(),
            matches = result.matches.len(),
            sources_checked = result.sources_checked,
            "internet scan finished"
        );
        result
    }

    async fn check_source(
        &self,
        chunk: &Chunk,
        result: SearchResult,
        ctl: &ScanControl,
    ) -> SourceOutcome {
        if let Some(w) = ctl.interruption() {
            return SourceOutcome {
                interrupted: Some(w),
                ..SourceOutcome::default()
            };
        }

        let page = tokio::select! {
            t = self.fetcher.fetch_visible_text(&result.url) => t,
            w = ctl.interrupted() => {
                return SourceOutcome {
                    attempted: true,
                    interrupted: Some(w),
                    ..SourceOutcome::default()
                };
            }
        };

        let (page, origin) = if page.chars().count() >= self.fetch.min_page_chars {
            (page, MatchOrigin::Page)
        } else {
            match result.snippet.as_deref().map(norm_ws) {
                Some(s) if self.fetch.snippet_fallback && !s.is_empty() => (s, MatchOrigin::Snippet),
                _ => {
                    tracing::debug!(url = %result.url, chars = page.len(), "page unusable");
                    return SourceOutcome {
                        attempted: true,
                        ..SourceOutcome::default()
                    };
                }
            }
        };

        let matcher = self.matcher.clone();
        let chunk = chunk.clone();
        let url = result.url;
        let scored =
            tokio::task::spawn_blocking(move || matcher.match_page(&chunk, &url, &page, origin))
                .await;
        match scored {
            Ok(matches) => SourceOutcome {
                attempted: true,
                matches,
                interrupted: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "page matching task failed");
                SourceOutcome {
                    attempted: true,
                    ..SourceOutcome::default()
                }
            }
        }
    }
}
