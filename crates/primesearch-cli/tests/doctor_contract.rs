use std::io::Write;

#[test]
fn primesearch_doctor_contract_without_remote_check() {
    let bin = assert_cmd::cargo::cargo_bin!("primesearch");
    let out = std::process::Command::new(bin)
        .args(["doctor", "--check-remote=false", "--timeout-ms", "1"])
        // Ensure we don't accidentally inherit keys from the environment.
        .env_remove("BIGMODEL_API_KEY")
        .env_remove("PRIMESEARCH_ENDPOINT")
        .env_remove("PRIMESEARCH_ENV_FILE")
        .output()
        .expect("run primesearch doctor");

    assert!(out.status.success(), "primesearch doctor failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("primesearch"));
    assert!(v.get("elapsed_ms").is_some());
    assert_eq!(v["configured"]["api_key"].as_bool(), Some(false));
    assert_eq!(v["configured"]["tool"].as_str(), Some("webSearchPrime"));
    assert!(v["configured"]["endpoint"]
        .as_str()
        .unwrap_or("")
        .starts_with("https://"));
    assert_eq!(v["ok"].as_bool(), Some(false));

    let checks = v["checks"].as_array().expect("checks array");
    let remote = checks
        .iter()
        .find(|c| c["name"].as_str() == Some("remote_tool_listing"))
        .expect("remote_tool_listing check");
    assert_eq!(remote["skipped"].as_bool(), Some(true));
    assert_eq!(remote["ok"].as_bool(), Some(true));
}

#[test]
fn doctor_reads_env_file_without_printing_the_key() {
    let mut f = tempfile::NamedTempFile::new().expect("temp env file");
    writeln!(f, "# comment line").unwrap();
    writeln!(f, "BIGMODEL_API_KEY=very-secret-value").unwrap();
    writeln!(f, "PRIMESEARCH_ENDPOINT=http://127.0.0.1:9/mcp").unwrap();

    let bin = assert_cmd::cargo::cargo_bin!("primesearch");
    let out = std::process::Command::new(bin)
        .args(["doctor"])
        .env_remove("BIGMODEL_API_KEY")
        .env_remove("PRIMESEARCH_ENDPOINT")
        .env("PRIMESEARCH_ENV_FILE", f.path())
        .output()
        .expect("run primesearch doctor");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("very-secret-value"));
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    assert_eq!(v["configured"]["api_key"].as_bool(), Some(true));
    assert_eq!(
        v["configured"]["endpoint"].as_str(),
        Some("http://127.0.0.1:9/mcp")
    );
}

#[test]
fn doctor_picks_up_api_key_from_process_env() {
    let bin = assert_cmd::cargo::cargo_bin!("primesearch");
    let out = std::process::Command::new(bin)
        .args(["doctor", "--check-remote=false"])
        .env_remove("PRIMESEARCH_ENV_FILE")
        .env("BIGMODEL_API_KEY", "env-only-secret")
        .env("PRIMESEARCH_ENDPOINT", "http://127.0.0.1:9/mcp")
        .output()
        .expect("run primesearch doctor");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("env-only-secret"));
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    assert_eq!(v["configured"]["api_key"].as_bool(), Some(true));
    assert_eq!(
        v["configured"]["endpoint"].as_str(),
        Some("http://127.0.0.1:9/mcp")
    );
}

#[test]
fn help_names_env_fallbacks_but_hides_the_key() {
    let bin = assert_cmd::cargo::cargo_bin!("primesearch");
    let out = std::process::Command::new(bin)
        .args(["search", "--help"])
        .env_remove("PRIMESEARCH_ENV_FILE")
        .env("BIGMODEL_API_KEY", "help-secret")
        .output()
        .expect("run primesearch search --help");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.contains("BIGMODEL_API_KEY"));
    assert!(s.contains("PRIMESEARCH_ENDPOINT"));
    assert!(!s.contains("help-secret"));
}
