//! Score aggregation: bounded percentages and discrete levels.
//!
//! Pure and total; empty inputs are defined (score 0).

use crate::lexical::LexicalScores;
use plagcheck_core::{AggregationPolicy, Match, PairwiseLevel, PairwiseResult, RiskLevel};
use std::collections::BTreeSet;

pub const TFIDF_WEIGHT: f64 = 0.4;
pub const JACCARD_WEIGHT: f64 = 0.3;
pub const SEQUENCE_WEIGHT: f64 = 0.3;

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn unit_to_percent(x: f64) -> f64 {
    round2(x.clamp(0.0, 1.0) * 100.0)
}

/// `<= 30` Low, `<= 70` Medium, otherwise High. Boundaries fall in the lower band.
pub fn classify_pairwise(percent: f64) -> PairwiseLevel {
    if percent <= 30.0 {
        PairwiseLevel::Low
    } else if percent <= 70.0 {
        PairwiseLevel::Medium
    } else {
        PairwiseLevel::High
    }
}

/// `>= 70` High, `>= 30` Moderate, `> 0` Low, otherwise Unique.
pub fn classify_internet(percent: f64) -> RiskLevel {
    if percent >= 70.0 {
        RiskLevel::High
    } else if percent >= 30.0 {
        RiskLevel::Moderate
    } else if percent > 0.0 {
        RiskLevel::Low
    } else {
        RiskLevel::Unique
    }
}

/// Weighted lexical combination as a percentage; sub-scores are taken unrounded.
pub fn combined_percent(scores: &LexicalScores) -> f64 {
    let combined = TFIDF_WEIGHT * scores.tfidf.clamp(0.0, 1.0)
        + JACCARD_WEIGHT * scores.jaccard.clamp(0.0, 1.0)
        + SEQUENCE_WEIGHT * scores.sequence.clamp(0.0, 1.0);
    unit_to_percent(combined)
}

pub fn pairwise_result(scores: &LexicalScores, a_sha256: String, b_sha256: String) -> PairwiseResult {
    let combined = combined_percent(scores);
    PairwiseResult {
        tfidf: unit_to_percent(scores.tfidf),
        jaccard: unit_to_percent(scores.jaccard),
        sequence: unit_to_percent(scores.sequence),
        combined,
        level: classify_pairwise(combined),
        a_sha256,
        b_sha256,
    }
}

/// Overall internet score over accepted matches (0 when there are none).
pub fn internet_score(matches: &[Match], policy: AggregationPolicy) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    let raw = match policy {
        AggregationPolicy::Mean => {
            matches.iter().map(|m| m.score).sum::<f64>() / matches.len() as f64
        }
        AggregationPolicy::Max => matches.iter().map(|m| m.score).fold(0.0, f64::max),
    };
    round2(raw.clamp(0.0, 100.0))
}

/// Distinct sources among the matches.
pub fn sources_matched(matches: &[Match]) -> usize {
    matches
        .iter()
        .map(|m| m.source.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Descending by score; the sort is stable so ties keep discovery order.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
