use axum::{
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::process::{Command, Output};

const SOURCE_TEXT: &str = "Photosynthesis converts light energy into chemical energy stored in glucose molecules. \
    Chlorophyll inside the chloroplast absorbs red and blue wavelengths of sunlight very efficiently. \
    The Calvin cycle fixes atmospheric carbon dioxide into three carbon sugars during the dark reactions. \
    Oxygen is released as a byproduct when water molecules are split during the light reactions.";

fn plagcheck() -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("plagcheck");
    let mut cmd = Command::new(bin);
    for k in [
        "PLAGCHECK_SERPER_API_KEY",
        "SERPER_API_KEY",
        "PLAGCHECK_SERPER_ENDPOINT",
        "PLAGCHECK_SEARXNG_ENDPOINT",
        "PLAGCHECK_ENV_FILE",
        "PLAGCHECK_CONFIG",
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        cmd.env_remove(k);
    }
    cmd
}

fn scan_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "plagcheck scan failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse scan json")
}

fn doc(dir: &std::path::Path, text: &str) -> std::path::PathBuf {
    let p = dir.join("doc.txt");
    std::fs::write(&p, text).unwrap();
    p
}

#[test]
fn short_document_is_reported_not_scanned() {
    let tmp = tempfile::tempdir().unwrap();
    let p = doc(tmp.path(), "A short note.");
    let out = plagcheck()
        .env("PLAGCHECK_SERPER_API_KEY", "unused")
        // Nothing listens here; a search attempt would only add warnings.
        .env("PLAGCHECK_SERPER_ENDPOINT", "http://127.0.0.1:9/search")
        .args(["scan", p.to_str().unwrap()])
        .output()
        .expect("run plagcheck scan");
    let v = scan_json(&out);
    let r = &v["result"];
    assert_eq!(r["overall_score"].as_f64(), Some(0.0));
    assert_eq!(r["level"].as_str(), Some("Unique"));
    assert_eq!(r["sources_checked"].as_u64(), Some(0));
    assert_eq!(r["warnings"][0].as_str(), Some("document_too_short"));
}

#[test]
fn missing_search_key_short_circuits_with_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let p = doc(tmp.path(), SOURCE_TEXT);
    let out = plagcheck()
        .args(["scan", p.to_str().unwrap()])
        .output()
        .expect("run plagcheck scan");
    let v = scan_json(&out);
    assert!(v["provider"].is_null());
    assert_eq!(v["encoder"].as_str(), Some("hashing-bow"));
    let r = &v["result"];
    assert_eq!(r["sources_checked"].as_u64(), Some(0));
    assert_eq!(r["level"].as_str(), Some("Unique"));
    assert_eq!(r["warnings"][0].as_str(), Some("search_not_configured"));
    assert_eq!(r["document_sha256"].as_str().map(str::len), Some(64));
}

#[test]
fn invalid_policy_and_config_are_usage_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let p = doc(tmp.path(), SOURCE_TEXT);

    let out = plagcheck()
        .args(["scan", p.to_str().unwrap(), "--policy", "median"])
        .output()
        .expect("run plagcheck scan");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("aggregation policy"));

    let cfg = tmp.path().join("bad.toml");
    std::fs::write(&cfg, "[search]\nprovider = \"bing\"\n").unwrap();
    let out = plagcheck()
        .args(["scan", p.to_str().unwrap(), "--config", cfg.to_str().unwrap()])
        .output()
        .expect("run plagcheck scan");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("search.provider"));
}

/// Serper-shaped search endpoint whose only result is a page on the same server.
fn mock_web(addr_tx: std::sync::mpsc::Sender<SocketAddr>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let page_url = format!("http://{addr}/biology/photosynthesis");
        let app = Router::new()
            .route(
                "/search",
                post(move |headers: HeaderMap| {
                    let page_url = page_url.clone();
                    async move {
                        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("test-key")
                        {
                            return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
                        }
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "organic": [
                                    {"title": "Photosynthesis", "link": page_url, "snippet": "light energy"},
                                    {"title": "Same page", "link": format!("{page_url}#calvin"), "snippet": "calvin"}
                                ]
                            })),
                        )
                    }
                }),
            )
            .route(
                "/biology/photosynthesis",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                        format!(
                            "<html><head><title>Bio</title></head><body>\
                             <nav>Home Topics</nav><article><p>{SOURCE_TEXT}</p></article>\
                             <footer>Copyright</footer></body></html>"
                        ),
                    )
                }),
            );
        addr_tx.send(addr).unwrap();
        axum::serve(listener, app).await.unwrap();
    });
}

#[test]
fn copied_document_is_matched_against_web_source() {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || mock_web(tx));
    let addr = rx.recv().unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let p = doc(tmp.path(), SOURCE_TEXT);
    let out = plagcheck()
        .env("PLAGCHECK_SERPER_API_KEY", "test-key")
        .env("PLAGCHECK_SERPER_ENDPOINT", format!("http://{addr}/search"))
        .args(["scan", p.to_str().unwrap(), "--policy", "max"])
        .output()
        .expect("run plagcheck scan");
    let v = scan_json(&out);
    assert_eq!(v["provider"].as_str(), Some("serper"));

    let r = &v["result"];
    // The fragment-only duplicate is not fetched again.
    assert_eq!(r["sources_checked"].as_u64(), Some(1));
    assert_eq!(r["sources_matched"].as_u64(), Some(1));
    assert_eq!(r["overall_score"].as_f64(), Some(100.0));
    assert_eq!(r["level"].as_str(), Some("High"));
    let matches = r["matches"].as_array().expect("matches");
    assert_eq!(matches.len(), 4);
    for m in matches {
        assert!(m["source"]
            .as_str()
            .unwrap_or("")
            .ends_with("/biology/photosynthesis"));
        assert_eq!(m["origin"].as_str(), Some("page"));
        assert_eq!(m["query_text"], m["matched_text"]);
    }
    assert!(r["warnings"].as_array().unwrap().is_empty());
}
