use anyhow::Result;
use clap::{Parser, Subcommand};
use primesearch_core::{
    ContentSize, Error as SearchError, Location, RecencyFilter, SearchOptions, SearchOutcome,
    SearchParams,
};
use primesearch_local::{ClientConfig, SearchClient};
use serde::Serialize;
use std::collections::BTreeMap;

const ENV_FILE_VAR: &str = "PRIMESEARCH_ENV_FILE";

#[derive(Parser, Debug)]
#[command(name = "primesearch")]
#[command(about = "Web search over the webSearchPrime MCP tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one search and print normalized items (json|text).
    Search(SearchCmd),
    /// List the tools exposed by the remote endpoint (json).
    Tools(ToolsCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ConnArgs {
    /// API key.
    #[arg(long, env = "BIGMODEL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// MCP endpoint URL. Falls back to the public endpoint.
    #[arg(long, env = "PRIMESEARCH_ENDPOINT")]
    endpoint: Option<String>,
    /// Extra transport header (repeatable), as NAME=VALUE. Cannot replace Authorization.
    #[arg(long = "header")]
    headers: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// Search query.
    query: String,
    /// Number of results to request (1-50).
    #[arg(long, default_value_t = 10)]
    count: u32,
    /// Allowed: medium, high
    #[arg(long, default_value = "medium")]
    content_size: String,
    /// Allowed: cn, us
    #[arg(long, default_value = "cn")]
    location: String,
    /// Restrict results to this domain.
    #[arg(long)]
    domain: Option<String>,
    /// Allowed: oneDay, oneWeek, oneMonth, oneYear, noLimit
    #[arg(long, default_value = "noLimit")]
    recency: String,
    #[command(flatten)]
    conn: ConnArgs,
    /// Establish a fresh session instead of using the pooled one.
    #[arg(long)]
    no_reuse: bool,
    /// Check that the tool is listed by the endpoint before calling it.
    #[arg(long)]
    validate_tool: bool,
    /// Soft deadline for the remote call (ms).
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ToolsCmd {
    #[command(flatten)]
    conn: ConnArgs,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    #[command(flatten)]
    conn: ConnArgs,
    /// Attempt a remote handshake and tool listing.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    check_remote: bool,
    /// Timeout for the remote check (ms).
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Opt-in `KEY=VALUE` file. Never overrides variables already set in the process.
fn load_env_file() {
    let Ok(p) = std::env::var(ENV_FILE_VAR) else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Stdout carries results only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for h in raw {
        let Some((k, v)) = h.split_once('=') else {
            anyhow::bail!("invalid --header {h:?}; expected NAME=VALUE");
        };
        let k = k.trim();
        if k.is_empty() {
            anyhow::bail!("invalid --header {h:?}; empty name");
        }
        out.insert(k.to_string(), v.trim().to_string());
    }
    Ok(out)
}

fn parse_content_size(s: &str) -> Result<ContentSize> {
    match s.trim().to_ascii_lowercase().as_str() {
        "medium" => Ok(ContentSize::Medium),
        "high" => Ok(ContentSize::High),
        other => anyhow::bail!("unknown content size {other:?} (allowed: medium, high)"),
    }
}

fn parse_location(s: &str) -> Result<Location> {
    match s.trim().to_ascii_lowercase().as_str() {
        "cn" => Ok(Location::Cn),
        "us" => Ok(Location::Us),
        other => anyhow::bail!("unknown location {other:?} (allowed: cn, us)"),
    }
}

fn parse_recency(s: &str) -> Result<RecencyFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "oneday" => Ok(RecencyFilter::OneDay),
        "oneweek" => Ok(RecencyFilter::OneWeek),
        "onemonth" => Ok(RecencyFilter::OneMonth),
        "oneyear" => Ok(RecencyFilter::OneYear),
        "nolimit" => Ok(RecencyFilter::NoLimit),
        other => anyhow::bail!(
            "unknown recency {other:?} (allowed: oneDay, oneWeek, oneMonth, oneYear, noLimit)"
        ),
    }
}

/// Process-boundary config: environment first, then explicit flags.
fn client_config(conn: &ConnArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env();
    if let Some(k) = conn.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        config = config.with_api_key(k.trim());
    }
    if let Some(e) = conn.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
        config = config.with_endpoint(e.trim());
    }
    config.transport_headers = parse_headers(&conn.headers)?;
    Ok(config)
}

fn error_envelope(kind: &str, e: &SearchError) -> serde_json::Value {
    let mut error = serde_json::json!({
        "code": e.kind(),
        "message": e.to_string(),
    });
    if let SearchError::RemoteApplicationError { raw } = e {
        error["raw"] = raw.clone();
    }
    serde_json::json!({
        "schema_version": 1,
        "kind": kind,
        "ok": false,
        "error": error,
    })
}

fn render_text(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    for (i, it) in outcome.items.iter().enumerate() {
        out.push_str(&format!("{}. {}\n   {}\n", i + 1, it.title, it.url));
        if let Some(site) = it.site_name.as_deref() {
            out.push_str(&format!("   site: {site}\n"));
        }
        if let Some(summary) = it.summary.as_deref() {
            let short: String = summary.chars().take(240).collect();
            out.push_str(&format!("   {}\n", short.replace('\n', " ")));
        }
    }
    out.push_str(&format!(
        "({} of {} requested, {}ms)\n",
        outcome.meta.returned_count, outcome.meta.requested_count, outcome.meta.elapsed_ms
    ));
    out
}

async fn run_search(args: SearchCmd) -> Result<bool> {
    let config = client_config(&args.conn)?;
    let mut params = SearchParams::new(args.query)
        .with_count(args.count)
        .with_content_size(parse_content_size(&args.content_size)?)
        .with_location(parse_location(&args.location)?)
        .with_recency(parse_recency(&args.recency)?);
    if let Some(d) = args.domain {
        params = params.with_domain_filter(d);
    }
    let opts = SearchOptions {
        reuse_connection: !args.no_reuse,
        validate_tool_availability: args.validate_tool,
        timeout_ms: args.timeout_ms,
        ..Default::default()
    };

    tracing::debug!(endpoint = %config.endpoint, count = params.count, "running search");
    let client = SearchClient::with_rmcp(config);
    match client.search(params, opts).await {
        Ok(outcome) => {
            if args.output.eq_ignore_ascii_case("text") {
                print!("{}", render_text(&outcome));
            } else {
                let mut v = serde_json::to_value(&outcome)?;
                if let Some(obj) = v.as_object_mut() {
                    obj.insert("schema_version".to_string(), 1.into());
                    obj.insert("kind".to_string(), "search".into());
                    obj.insert("ok".to_string(), true.into());
                }
                println!("{v}");
            }
            Ok(true)
        }
        Err(e) => {
            println!("{}", error_envelope("search", &e));
            Ok(false)
        }
    }
}

async fn run_tools(args: ToolsCmd) -> Result<bool> {
    let config = client_config(&args.conn)?;
    let tool = config.tool_name.clone();
    let client = SearchClient::with_rmcp(config);
    match client.list_tools(&SearchOptions::default()).await {
        Ok(tools) => {
            let present = tools.iter().any(|t| *t == tool);
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "tools",
                    "ok": true,
                    "tools": tools,
                    "tool": tool,
                    "tool_present": present,
                })
            );
            Ok(true)
        }
        Err(e) => {
            println!("{}", error_envelope("tools", &e));
            Ok(false)
        }
    }
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    skipped: bool,
    elapsed_ms: Option<u128>,
    message: String,
    error: Option<serde_json::Value>,
}

async fn run_doctor(args: DoctorCmd) -> Result<bool> {
    let t0 = std::time::Instant::now();
    let config = client_config(&args.conn)?;
    let has_key = config.api_key.is_some();
    let endpoint = config.endpoint.clone();
    let tool = config.tool_name.clone();

    let mut checks = vec![Check {
        name: "api_key_present",
        ok: has_key,
        skipped: false,
        elapsed_ms: None,
        message: if has_key {
            "api key configured".to_string()
        } else {
            "no api key; set BIGMODEL_API_KEY or pass --api-key".to_string()
        },
        error: None,
    }];

    let remote = if !args.check_remote {
        Check {
            name: "remote_tool_listing",
            ok: true,
            skipped: true,
            elapsed_ms: None,
            message: "skipped (pass --check-remote=true)".to_string(),
            error: None,
        }
    } else {
        let client = SearchClient::with_rmcp(config);
        let check_t0 = std::time::Instant::now();
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(args.timeout_ms),
            client.list_tools(&SearchOptions::default()),
        )
        .await;
        let elapsed_ms = Some(check_t0.elapsed().as_millis());
        match res {
            Ok(Ok(tools)) => {
                let present = tools.iter().any(|t| *t == tool);
                Check {
                    name: "remote_tool_listing",
                    ok: present,
                    skipped: false,
                    elapsed_ms,
                    message: if present {
                        format!("{tool} is available")
                    } else {
                        format!("{tool} missing from {} listed tools", tools.len())
                    },
                    error: None,
                }
            }
            Ok(Err(e)) => Check {
                name: "remote_tool_listing",
                ok: false,
                skipped: false,
                elapsed_ms,
                message: "remote tool listing failed".to_string(),
                error: Some(serde_json::json!({ "code": e.kind(), "message": e.to_string() })),
            },
            Err(_) => Check {
                name: "remote_tool_listing",
                ok: false,
                skipped: false,
                elapsed_ms,
                message: format!("no answer within {}ms", args.timeout_ms),
                error: Some(serde_json::json!({ "code": "timeout" })),
            },
        }
    };
    checks.push(remote);

    let ok = checks.iter().all(|c| c.ok);
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "primesearch",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "api_key": has_key,
            "endpoint": endpoint,
            "tool": tool,
        },
        "checks": checks,
    });
    println!("{v}");
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_logging();
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Search(args) => run_search(args).await?,
        Commands::Tools(args) => run_tools(args).await?,
        Commands::Doctor(args) => run_doctor(args).await?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "primesearch",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("primesearch {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
            true
        }
    };
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_parse_name_value_pairs() {
        let h = parse_headers(&["X-A = 1".to_string(), "X-B=a=b".to_string()]).unwrap();
        assert_eq!(h["X-A"], "1");
        assert_eq!(h["X-B"], "a=b");
        assert!(parse_headers(&["nope".to_string()]).is_err());
        assert!(parse_headers(&["=v".to_string()]).is_err());
    }

    #[test]
    fn enum_flags_are_case_insensitive() {
        assert_eq!(parse_recency("oneWeek").unwrap(), RecencyFilter::OneWeek);
        assert_eq!(parse_recency("NOLIMIT").unwrap(), RecencyFilter::NoLimit);
        assert_eq!(parse_location("US").unwrap(), Location::Us);
        assert_eq!(parse_content_size("High").unwrap(), ContentSize::High);
        assert!(parse_recency("fortnight").is_err());
    }

    #[test]
    fn error_envelope_includes_raw_application_reply() {
        let e = SearchError::RemoteApplicationError {
            raw: serde_json::json!({"isError": true}),
        };
        let v = error_envelope("search", &e);
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"]["code"], "remote_application_error");
        assert_eq!(v["error"]["raw"]["isError"], true);
    }

    #[test]
    fn cli_parses_search_flags() {
        let cli = Cli::try_parse_from([
            "primesearch",
            "search",
            "rust async",
            "--count",
            "5",
            "--header",
            "X-A=1",
            "--no-reuse",
            "--output",
            "text",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "rust async");
        assert_eq!(args.count, 5);
        assert!(args.no_reuse);
        assert_eq!(args.conn.headers, vec!["X-A=1".to_string()]);
    }
}
