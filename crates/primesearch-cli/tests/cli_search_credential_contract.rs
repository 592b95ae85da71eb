use assert_cmd::prelude::*;
use std::process::Command;

fn search_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("primesearch"));
    cmd.env_remove("BIGMODEL_API_KEY")
        .env_remove("PRIMESEARCH_ENV_FILE")
        // Unroutable: if the credential gate ever let a request through, it would fail loudly
        // with a different error code.
        .env("PRIMESEARCH_ENDPOINT", "http://127.0.0.1:9/mcp");
    cmd
}

#[test]
fn search_without_credential_fails_fast_with_json_envelope() {
    let out = search_cmd()
        .args(["search", "rust", "--count", "5"])
        .output()
        .expect("run primesearch search");

    assert!(!out.status.success(), "search without key should fail");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse error envelope");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["kind"].as_str(), Some("search"));
    assert_eq!(v["error"]["code"].as_str(), Some("missing_credential"));
}

#[test]
fn blank_api_key_flag_counts_as_missing() {
    let out = search_cmd()
        .args(["search", "rust", "--api-key", "   "])
        .output()
        .expect("run primesearch search");
    assert!(!out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&out.stdout)).expect("parse envelope");
    assert_eq!(v["error"]["code"].as_str(), Some("missing_credential"));
}

#[test]
fn blank_query_is_rejected_before_network() {
    let out = search_cmd()
        .args(["search", "  ", "--api-key", "k"])
        .output()
        .expect("run primesearch search");
    assert!(!out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&out.stdout)).expect("parse envelope");
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
}

#[test]
fn unknown_recency_is_a_usage_error() {
    search_cmd()
        .args(["search", "rust", "--recency", "fortnight"])
        .assert()
        .failure();
}
