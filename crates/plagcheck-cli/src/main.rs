use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plagcheck_core::AggregationPolicy;
use plagcheck_local::{check_pair, load_config, EngineConfig, InternetMatchPipeline, ScanControl};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "plagcheck")]
#[command(about = "Pairwise and internet plagiarism checks (JSON on stdout)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two plain-text files (TF-IDF, Jaccard, sequence ratio).
    Check(CheckCmd),
    /// Scan one plain-text file against web sources.
    Scan(ScanCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct CheckCmd {
    /// First document (plain text; `-` reads stdin).
    a: PathBuf,
    /// Second document (plain text).
    b: PathBuf,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ScanCmd {
    /// Document to scan (plain text; `-` reads stdin).
    file: PathBuf,
    /// Engine config (TOML). Defaults apply to anything it leaves out.
    #[arg(long, env = "PLAGCHECK_CONFIG")]
    config: Option<PathBuf>,
    /// Abandon the scan after this many milliseconds and report what was found.
    #[arg(long)]
    deadline_ms: Option<u64>,
    /// Overall-score rule: mean|max (overrides the config file).
    #[arg(long)]
    policy: Option<String>,
    /// Match against search snippets when a page cannot be used.
    #[arg(long, action = clap::ArgAction::Set)]
    snippet_fallback: Option<bool>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Engine config (TOML) to validate.
    #[arg(long, env = "PLAGCHECK_CONFIG")]
    config: Option<PathBuf>,
    /// Load the configured sentence encoder (may download model files).
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    check_encoder: bool,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut s = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut s)
            .context("failed to read stdin")?;
        return Ok(s);
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => Ok(load_config(p)?),
        None => Ok(EngineConfig::default()),
    }
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    plagcheck_cli::load_env_file_from_env();
    plagcheck_cli::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => {
            let a = read_input(&args.a)?;
            let b = read_input(&args.b)?;
            let r = tokio::task::spawn_blocking(move || check_pair(&a, &b))
                .await
                .context("pairwise check task failed")?;
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("combined: {:.2}% ({})", r.combined, r.level.as_str());
                    println!(
                        "tfidf: {:.2}%  jaccard: {:.2}%  sequence: {:.2}%",
                        r.tfidf, r.jaccard, r.sequence
                    );
                }
                _ => {
                    let v = serde_json::json!({
                        "schema_version": 1,
                        "kind": "check",
                        "ok": true,
                        "result": r,
                    });
                    println!("{v}");
                }
            }
        }
        Commands::Scan(args) => {
            let text = read_input(&args.file)?;
            let mut cfg = engine_config(args.config.as_deref())?;
            if let Some(p) = args.policy.as_deref() {
                cfg.matching.aggregation = p.parse::<AggregationPolicy>()?;
            }
            if let Some(on) = args.snippet_fallback {
                cfg.fetch.snippet_fallback = on;
            }
            let pipeline = InternetMatchPipeline::from_config(&cfg)?;

            let mut ctl = ScanControl::new();
            if let Some(ms) = args.deadline_ms {
                ctl = ctl.with_timeout(std::time::Duration::from_millis(ms));
            }
            let token = ctl.cancel_token().clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; finishing with partial results");
                    token.cancel();
                }
            });

            let t0 = std::time::Instant::now();
            let r = pipeline.scan(&text, &ctl).await;
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("overall: {:.2}% ({})", r.overall_score, r.level.as_str());
                    println!(
                        "sources: checked={} matched={}",
                        r.sources_checked, r.sources_matched
                    );
                    for w in &r.warnings {
                        println!("warning: {w}");
                    }
                    for m in &r.matches {
                        println!("- {:.2}% {}", m.score, m.source);
                        println!("    text:   {}", m.query_text);
                        println!("    source: {}", m.matched_text);
                    }
                }
                _ => {
                    let v = serde_json::json!({
                        "schema_version": 1,
                        "kind": "scan",
                        "ok": true,
                        "provider": pipeline.search_provider(),
                        "encoder": pipeline.encoder_model(),
                        "elapsed_ms": t0.elapsed().as_millis(),
                        "result": r,
                    });
                    println!("{v}");
                }
            }
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();
            let serper_configured =
                has_env("PLAGCHECK_SERPER_API_KEY") || has_env("SERPER_API_KEY");
            let searxng_configured = has_env("PLAGCHECK_SEARXNG_ENDPOINT");

            let mut checks: Vec<serde_json::Value> = Vec::new();

            let cfg = engine_config(args.config.as_deref());
            checks.push(serde_json::json!({
                "name": "config",
                "ok": cfg.is_ok(),
                "skipped": false,
                "source": args.config.as_ref().map(|p| p.display().to_string()),
                "error": cfg.as_ref().err().map(|e| e.to_string()),
            }));
            let cfg = cfg.unwrap_or_default();

            let provider = cfg.search.provider.trim().to_ascii_lowercase();
            let provider_ok = match provider.as_str() {
                "serper" => serper_configured,
                "searxng" => searxng_configured,
                _ => true,
            };
            checks.push(serde_json::json!({
                "name": "search_provider",
                "ok": provider_ok,
                "skipped": provider == "disabled",
                "provider": provider,
                "hint": if provider_ok {
                    ""
                } else if provider == "searxng" {
                    "Set PLAGCHECK_SEARXNG_ENDPOINT; internet scans return search_not_configured until then."
                } else {
                    "Set PLAGCHECK_SERPER_API_KEY (or SERPER_API_KEY); internet scans return search_not_configured until then."
                },
            }));

            let encoder_check = if args.check_encoder {
                let t_enc = std::time::Instant::now();
                let loaded = tokio::task::spawn_blocking({
                    let enc = cfg.encoder.clone();
                    move || {
                        plagcheck_local::encoder_from_config(&enc)
                            .map(|e| e.model_name().to_string())
                    }
                })
                .await
                .context("encoder check task failed")?;
                serde_json::json!({
                    "name": "encoder_load",
                    "ok": loaded.is_ok(),
                    "skipped": false,
                    "model": loaded.as_ref().ok(),
                    "elapsed_ms": t_enc.elapsed().as_millis(),
                    "error": loaded.as_ref().err().map(|e| e.to_string()),
                })
            } else {
                serde_json::json!({
                    "name": "encoder_load",
                    "ok": true,
                    "skipped": true,
                    "model": serde_json::Value::Null,
                    "elapsed_ms": 0,
                    "error": serde_json::Value::Null,
                })
            };
            checks.push(encoder_check);

            let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "plagcheck",
                "version": env!("CARGO_PKG_VERSION"),
                "platform": {
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
                "features": {
                    "local_embeddings": cfg!(feature = "local-embeddings"),
                },
                "elapsed_ms": t0.elapsed().as_millis(),
                "configured": {
                    "providers": {
                        "serper": serper_configured,
                        "searxng": searxng_configured,
                    },
                    "search_provider": cfg.search.provider,
                    "encoder_backend": cfg.encoder.backend,
                    "aggregation": cfg.matching.aggregation,
                    "env_file": has_env("PLAGCHECK_ENV_FILE"),
                },
                "checks": checks,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("plagcheck {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
                    println!(
                        "providers: serper={} searxng={}",
                        serper_configured, searxng_configured
                    );
                    println!("checks:");
                    if let Some(arr) = payload["checks"].as_array() {
                        for c in arr {
                            let name = c["name"].as_str().unwrap_or("?");
                            let ok = c["ok"].as_bool().unwrap_or(false);
                            let skipped = c["skipped"].as_bool().unwrap_or(false);
                            if skipped {
                                println!("- {}: skipped", name);
                            } else {
                                println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                            }
                        }
                    }
                }
                _ => println!("{payload}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "plagcheck",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("plagcheck {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }

    Ok(())
}
