//! `plagcheck` crate (library surface).
//!
//! The primary entrypoint is the `plagcheck` binary. This module holds the
//! process-level plumbing it needs (env-file loading, log setup) and re-exports
//! the engine crates for embedding.

pub use plagcheck_core as core;
pub use plagcheck_local as local;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `KEY=VALUE` pairs from a dotenv-style file. Blank lines, `#` comments and
/// lines without `=` are skipped; surrounding quotes on values are removed.
pub fn parse_env_file(txt: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        let v = v.trim();
        let v = v
            .strip_prefix('"')
            .and_then(|x| x.strip_suffix('"'))
            .or_else(|| v.strip_prefix('\'').and_then(|x| x.strip_suffix('\'')))
            .unwrap_or(v);
        out.push((k.to_string(), v.to_string()));
    }
    out
}

/// Load the file named by `PLAGCHECK_ENV_FILE`, if any.
///
/// Only sets variables absent from the process environment and never logs
/// values. Returns the number of variables set.
pub fn load_env_file_from_env() -> usize {
    let Ok(p) = std::env::var("PLAGCHECK_ENV_FILE") else {
        return 0;
    };
    let p = p.trim();
    if p.is_empty() {
        return 0;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return 0;
    };
    let mut n = 0;
    for (k, v) in parse_env_file(&txt) {
        if std::env::var_os(&k).is_none() {
            std::env::set_var(&k, v);
            n += 1;
        }
    }
    n
}

/// Log filter directive: `PLAGCHECK_LOG`, then `RUST_LOG`, then `warn`.
pub fn log_filter_directive() -> String {
    ["PLAGCHECK_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "warn".to_string())
}

/// Install the global subscriber: human-readable lines on stderr so stdout
/// stays machine-readable JSON.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_new(log_filter_directive()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    // A second init (e.g. in tests) is not an error worth surfacing.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_file_parsing_skips_comments_and_strips_quotes() {
        let txt = r#"
# comment
PLAGCHECK_SERPER_API_KEY = "abc123"
export SERPER_API_KEY='xyz'
NOT_A_PAIR
=orphan
PLAGCHECK_LOG=debug
"#;
        let kv = parse_env_file(txt);
        assert_eq!(
            kv,
            vec![
                ("PLAGCHECK_SERPER_API_KEY".to_string(), "abc123".to_string()),
                ("SERPER_API_KEY".to_string(), "xyz".to_string()),
                ("PLAGCHECK_LOG".to_string(), "debug".to_string()),
            ]
        );
    }

    #[test]
    fn env_file_values_may_contain_equals() {
        let kv = parse_env_file("URL=http://x/?a=b");
        assert_eq!(kv, vec![("URL".to_string(), "http://x/?a=b".to_string())]);
    }
}
