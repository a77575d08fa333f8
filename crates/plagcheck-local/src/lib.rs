//! Local plagiarism engine: lexical pairwise scoring and the internet scan
//! pipeline (search providers, HTTP page fetching, sentence encoders).

pub mod aggregate;
pub mod config;
pub mod document;
pub mod extract;
pub mod fetch;
pub mod lexical;
pub mod ngram;
pub mod pipeline;
pub mod search;
pub mod segment;
pub mod semantic;
pub mod textprep;

pub use config::{load_config, parse_config, EngineConfig};
pub use document::Document;
pub use fetch::{HttpFetcher, PageFetcher};
pub use lexical::check_pair;
pub use pipeline::{InternetMatchPipeline, ScanControl};
pub use search::{SearxngSearchProvider, SerperSearchProvider, WebSourceSearcher};
pub use semantic::{encoder_from_config, HashingEncoder, SemanticScorer};

/// Sent on page fetches; some sites refuse non-browser agents outright.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
