//! Pairwise lexical measures: TF-IDF cosine, Jaccard, and character-sequence ratio.
//!
//! All measures return a value in `[0, 1]` and are total: blank, symbol-only, or
//! stop-word-only input scores `0.0`.

use crate::aggregate;
use crate::document::Document;
use plagcheck_core::PairwiseResult;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Upper bound on diff work for very long inputs; past it the diff is approximate.
const SEQUENCE_DIFF_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalScores {
    pub tfidf: f64,
    pub jaccard: f64,
    pub sequence: f64,
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut out = BTreeMap::new();
    for t in tokens {
        *out.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    out
}

/// TF-IDF cosine over a vector space built from exactly the two token lists.
///
/// Smoothed IDF (`ln((1 + n) / (1 + df)) + 1`, n = 2) with raw term counts.
pub fn tfidf_cosine_tokens(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let tf_a = term_counts(a);
    let tf_b = term_counts(b);
    let vocab: BTreeSet<&str> = tf_a.keys().chain(tf_b.keys()).copied().collect();

    let n_docs = 2.0f64;
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for term in vocab {
        let ca = tf_a.get(term).copied().unwrap_or(0.0);
        let cb = tf_b.get(term).copied().unwrap_or(0.0);
        let df = (ca > 0.0) as u8 as f64 + (cb > 0.0) as u8 as f64;
        let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        let wa = ca * idf;
        let wb = cb * idf;
        dot += wa * wb;
        norm_a += wa * wa;
        norm_b += wb * wb;
    }
    // sqrt(x * x) == x exactly, so identical inputs land on 1.0 without drift.
    let denom = (norm_a * norm_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(0.0, 1.0)
}

pub fn tfidf_cosine(a: &str, b: &str) -> f64 {
    tfidf_cosine_docs(&Document::new(a), &Document::new(b))
}

pub fn tfidf_cosine_docs(a: &Document, b: &Document) -> f64 {
    tfidf_cosine_tokens(a.tokens(), b.tokens())
}

/// Set intersection over union of normalized tokens; two empty sets score 0.
pub fn jaccard_tokens(a: &[String], b: &[String]) -> f64 {
    let sa: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let sb: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let uni = sa.union(&sb).count();
    if uni == 0 {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count();
    inter as f64 / uni as f64
}

pub fn jaccard(a: &str, b: &str) -> f64 {
    jaccard_docs(&Document::new(a), &Document::new(b))
}

pub fn jaccard_docs(a: &Document, b: &Document) -> f64 {
    jaccard_tokens(a.tokens(), b.tokens())
}

/// Diff-similarity over raw characters: `2 * matched / (len(a) + len(b))`.
///
/// Whitespace and punctuation count, so near-verbatim copies score higher here than
/// under the token measures.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let ratio = similar::TextDiff::configure()
        .algorithm(similar::Algorithm::Myers)
        .timeout(SEQUENCE_DIFF_TIMEOUT)
        .diff_chars(a, b)
        .ratio();
    (ratio as f64).clamp(0.0, 1.0)
}

pub fn score_documents(a: &Document, b: &Document) -> LexicalScores {
    LexicalScores {
        tfidf: tfidf_cosine_docs(a, b),
        jaccard: jaccard_docs(a, b),
        sequence: sequence_ratio(a.text(), b.text()),
    }
}

/// Full pairwise check: three lexical scores, weighted combination, and level.
pub fn check_pair(a: &str, b: &str) -> PairwiseResult {
    let da = Document::new(a);
    let db = Document::new(b);
    let scores = score_documents(&da, &db);
    tracing::debug!(
        tfidf = scores.tfidf,
        jaccard = scores.jaccard,
        sequence = scores.sequence,
        "pairwise lexical scores"
    );
    aggregate::pairwise_result(&scores, da.sha256(), db.sha256())
}
