//! Public facade crate for `plagcheck`.
//!
//! Result types and collaborator traits come from `plagcheck-core` and carry
//! no IO. With the default `engine` feature the local engine is re-exported as
//! well: [`check_pair`] for two texts, [`InternetMatchPipeline`] for web scans.

pub use plagcheck_core::*;

#[cfg(feature = "engine")]
pub use plagcheck_local::{
    check_pair, load_config, EngineConfig, HashingEncoder, InternetMatchPipeline, ScanControl,
    SemanticScorer,
};
