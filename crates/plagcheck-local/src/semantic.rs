//! Sentence-embedding similarity.
//!
//! The encoder is constructed once (see [`encoder_from_config`]) and handed to the
//! scorer; scoring never reloads it. Two backends:
//! - `hashing`: deterministic feature-hashed bag of words (no model download).
//! - `fastembed`: pretrained all-MiniLM-L6-v2 via ONNX Runtime (`local-embeddings` feature).

use crate::aggregate::round2;
use crate::config::EncoderConfig;
use crate::textprep;
use plagcheck_core::{Error, Result, SentenceEncoder};
use std::sync::Arc;

/// Cosine similarity in `[-1, 1]`; empty or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine mapped to a percentage: negatives clamp to 0, rounded to 2 decimals.
pub fn cosine_to_percent(cos: f32) -> f64 {
    round2((cos as f64).clamp(0.0, 1.0) * 100.0)
}

#[derive(Clone)]
pub struct SemanticScorer {
    encoder: Arc<dyn SentenceEncoder>,
}

impl std::fmt::Debug for SemanticScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScorer")
            .field("model", &self.encoder.model_name())
            .finish()
    }
}

impl SemanticScorer {
    pub fn new(encoder: Arc<dyn SentenceEncoder>) -> Self {
        Self { encoder }
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Semantic similarity of two strings as a percentage in `[0, 100]`.
    ///
    /// Blank input or an encoder failure scores 0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.trim().is_empty() || b.trim().is_empty() {
            return 0.0;
        }
        match self.embed(&[a.to_string(), b.to_string()]) {
            Some(v) => cosine_to_percent(cosine_similarity(&v[0], &v[1])),
            None => 0.0,
        }
    }

    /// Batch-encode; `None` when the encoder fails or returns the wrong shape.
    pub fn embed(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Some(Vec::new());
        }
        match self.encoder.encode(texts) {
            Ok(v) if v.len() == texts.len() => Some(v),
            Ok(v) => {
                tracing::warn!(
                    model = self.encoder.model_name(),
                    expected = texts.len(),
                    got = v.len(),
                    "encoder returned wrong batch size"
                );
                None
            }
            Err(e) => {
                tracing::warn!(model = self.encoder.model_name(), error = %e, "encoder failed");
                None
            }
        }
    }
}

fn fnv1a64(s: &str) -> u64 {
    // Stable across runs (unlike HashMap's RandomState).
    let mut h: u64 = 1469598103934665603;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

/// Deterministic bag-of-words encoder: normalized tokens hashed into `dims` buckets.
///
/// No paraphrase tolerance; identical wording scores 100 and disjoint wording 0.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dims: usize,
}

impl HashingEncoder {
    pub const MODEL_NAME: &'static str = "hashing-bow";

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for tok in textprep::normalize(text) {
            let idx = (fnv1a64(&tok) % self.dims as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl SentenceEncoder for HashingEncoder {
    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}

#[cfg(feature = "local-embeddings")]
pub struct FastEmbedEncoder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl FastEmbedEncoder {
    /// Load the model (downloading on first use). Call once per process.
    pub fn try_new(model_name: &str, batch_size: usize) -> Result<Self> {
        let (model, dims) = match model_name.trim().to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" => (fastembed::EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (fastembed::EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (fastembed::EmbeddingModel::BGEBaseENV15, 768),
            other => {
                return Err(Error::NotConfigured(format!(
                    "unknown fastembed model {other:?}"
                )))
            }
        };
        let te = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| Error::Encoder(format!("failed to load {model_name}: {e}")))?;
        tracing::info!(model = model_name, dims, "sentence encoder loaded");
        Ok(Self {
            model: std::sync::Mutex::new(te),
            name: model_name.trim().to_ascii_lowercase(),
            dims,
            batch_size: batch_size.max(1),
        })
    }
}

#[cfg(feature = "local-embeddings")]
impl SentenceEncoder for FastEmbedEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[allow(unused_mut)]
        let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| Error::Encoder(e.to_string()))
    }
}

/// Build the process-wide encoder named by the config.
pub fn encoder_from_config(cfg: &EncoderConfig) -> Result<Arc<dyn SentenceEncoder>> {
    match cfg.backend.trim().to_ascii_lowercase().as_str() {
        "hashing" => Ok(Arc::new(HashingEncoder::new(cfg.hashing_dims))),
        #[cfg(feature = "local-embeddings")]
        "fastembed" => Ok(Arc::new(FastEmbedEncoder::try_new(
            &cfg.model,
            cfg.batch_size,
        )?)),
        #[cfg(not(feature = "local-embeddings"))]
        "fastembed" => Err(Error::NotConfigured(
            "encoder.backend = \"fastembed\" requires the `local-embeddings` feature".to_string(),
        )),
        other => Err(Error::Config(format!(
            "unknown encoder backend {other:?} (expected hashing or fastembed)"
        ))),
    }
}
