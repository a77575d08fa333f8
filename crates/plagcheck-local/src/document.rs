use crate::textprep;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Submitted text plus its lazily computed normalized tokens.
///
/// Immutable once constructed; scoped to a single check or scan.
#[derive(Debug)]
pub struct Document {
    text: String,
    tokens: OnceLock<Vec<String>>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: OnceLock::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Normalized token multiset (see [`textprep::normalize`]), in text order.
    pub fn tokens(&self) -> &[String] {
        self.tokens.get_or_init(|| textprep::normalize(&self.text))
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Hex SHA-256 of the raw text, used to tie persisted results to their input.
    pub fn sha256(&self) -> String {
        let mut h = Sha256::new();
        h.update(self.text.as_bytes());
        hex::encode(h.finalize())
    }
}
