//! Word n-gram overlap, used as a cheap gate before semantic scoring.

use crate::textprep;
use std::collections::BTreeSet;

pub const DEFAULT_N: usize = 3;

fn shingles(tokens: &[String], n: usize) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if n == 0 || tokens.len() < n {
        return out;
    }
    for w in tokens.windows(n) {
        out.insert(w.join(" "));
    }
    out
}

/// Fraction of `a`'s distinct word n-grams that also occur in `b`.
///
/// Asymmetric on purpose: the denominator is `|ngrams(a)|` only, and the gate
/// thresholds are calibrated against that. Either side without an n-gram scores 0.
pub fn ngram_overlap(a: &str, b: &str, n: usize) -> f64 {
    let ga = shingles(&textprep::word_tokens(a), n);
    if ga.is_empty() {
        return 0.0;
    }
    let gb = shingles(&textprep::word_tokens(b), n);
    if gb.is_empty() {
        return 0.0;
    }
    let inter = ga.intersection(&gb).count();
    inter as f64 / ga.len() as f64
}
