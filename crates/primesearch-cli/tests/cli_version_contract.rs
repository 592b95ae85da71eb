#[test]
fn primesearch_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("primesearch");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("PRIMESEARCH_ENV_FILE")
        .output()
        .expect("run primesearch version");

    assert!(out.status.success(), "primesearch version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("primesearch"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn primesearch_version_text_output() {
    use assert_cmd::prelude::*;
    use predicates::prelude::*;

    std::process::Command::new(assert_cmd::cargo::cargo_bin!("primesearch"))
        .args(["version", "--output", "text"])
        .env_remove("PRIMESEARCH_ENV_FILE")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("primesearch "));
}
