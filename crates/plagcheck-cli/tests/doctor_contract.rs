use std::process::Command;

fn doctor() -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("plagcheck");
    let mut cmd = Command::new(bin);
    cmd.arg("doctor")
        // Ensure we don't accidentally inherit keys from the environment.
        .env_remove("PLAGCHECK_SERPER_API_KEY")
        .env_remove("SERPER_API_KEY")
        .env_remove("PLAGCHECK_SEARXNG_ENDPOINT")
        .env_remove("PLAGCHECK_ENV_FILE")
        .env_remove("PLAGCHECK_CONFIG");
    cmd
}

#[test]
fn plagcheck_doctor_contract_json_without_secrets() {
    let out = doctor()
        .env("PLAGCHECK_SERPER_API_KEY", "super-secret-value")
        .output()
        .expect("run plagcheck doctor");

    assert!(out.status.success(), "plagcheck doctor failed");
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("super-secret-value"), "doctor leaked a secret");
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("doctor"));
    assert_eq!(v["name"].as_str(), Some("plagcheck"));
    assert!(v.get("elapsed_ms").is_some());
    assert_eq!(
        v["features"]["local_embeddings"].as_bool(),
        Some(cfg!(feature = "local-embeddings"))
    );
    assert_eq!(v["configured"]["providers"]["serper"].as_bool(), Some(true));
    assert_eq!(v["configured"]["providers"]["searxng"].as_bool(), Some(false));
    assert_eq!(v["configured"]["search_provider"].as_str(), Some("serper"));
    assert_eq!(v["configured"]["encoder_backend"].as_str(), Some("hashing"));
    assert_eq!(v["ok"].as_bool(), Some(true));

    let checks = v["checks"].as_array().expect("checks array");
    let encoder = checks
        .iter()
        .find(|c| c["name"].as_str() == Some("encoder_load"))
        .expect("encoder_load check");
    assert_eq!(encoder["skipped"].as_bool(), Some(true));
}

#[test]
fn plagcheck_doctor_reports_missing_search_key() {
    let out = doctor().output().expect("run plagcheck doctor");
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse doctor json");
    assert_eq!(v["ok"].as_bool(), Some(false));
    let search = v["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"].as_str() == Some("search_provider"))
        .expect("search_provider check")
        .clone();
    assert_eq!(search["ok"].as_bool(), Some(false));
    assert!(search["hint"].as_str().unwrap_or("").contains("SERPER_API_KEY"));
}

#[test]
fn plagcheck_doctor_validates_config_and_loads_hashing_encoder() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = tmp.path().join("bad.toml");
    std::fs::write(&bad, "[matching]\nmatch_threshold = 250.0\n").unwrap();

    let out = doctor()
        .args(["--config", bad.to_str().unwrap(), "--check-encoder=true"])
        .output()
        .expect("run plagcheck doctor");
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse doctor json");
    let checks = v["checks"].as_array().unwrap();
    let config = checks
        .iter()
        .find(|c| c["name"].as_str() == Some("config"))
        .unwrap();
    assert_eq!(config["ok"].as_bool(), Some(false));
    assert!(config["error"].as_str().unwrap_or("").contains("[0, 100]"));

    let encoder = checks
        .iter()
        .find(|c| c["name"].as_str() == Some("encoder_load"))
        .unwrap();
    assert_eq!(encoder["skipped"].as_bool(), Some(false));
    assert_eq!(encoder["ok"].as_bool(), Some(true));
    assert_eq!(encoder["model"].as_str(), Some("hashing-bow"));
}
