use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyclass::config::{KeyclassConfig, LogFormat};
use keyclass::ratelimit::{Decision, KeyStrategy, Outcome, RateLimiter, RequestInfo, RuleSet};

/// Classify an HTTP request against a rule file.
#[derive(Debug, Parser)]
#[command(name = "keyclass", version, about)]
struct Args {
    /// Settings file (YAML, TOML or JSON)
    #[arg(long)]
    config: Option<String>,

    /// Rule file; overrides `rules_path` from the settings
    #[arg(long)]
    rules: Option<String>,

    /// Request URL, e.g. http://example.com/api/users?token=1
    #[arg(long)]
    url: String,

    #[arg(long, default_value = "GET")]
    method: String,

    /// Client address, optionally with a port
    #[arg(long, default_value = "127.0.0.1")]
    remote_addr: String,

    #[arg(long)]
    user_agent: Option<String>,

    /// Pre-resolved client country
    #[arg(long)]
    country: Option<String>,

    /// Replay the request this many times through in-memory counters
    #[arg(long, default_value_t = 0)]
    repeat: u32,

    /// Print decisions as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = KeyclassConfig::load(args.config.as_deref())?;
    init_tracing(&config);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let rules_path = args
        .rules
        .clone()
        .or_else(|| config.rules_path.clone())
        .context("no rule file given (use --rules or rules_path)")?;
    let rules = RuleSet::from_file(&rules_path)?;
    let strategies = rules.build()?;

    let request = build_request(&args)?;

    for strategy in &strategies {
        let decision = strategy.decide(&request);
        print_decision(strategy.as_ref(), &decision, args.json);
    }

    if args.repeat > 0 {
        replay(&strategies, &request, args.repeat).await?;
    }

    Ok(())
}

fn init_tracing(config: &KeyclassConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn build_request(args: &Args) -> anyhow::Result<RequestInfo> {
    let uri: http::Uri = args.url.parse().context("invalid --url")?;
    let mut builder = http::Request::builder().method(args.method.as_str()).uri(uri);
    if let Some(ua) = &args.user_agent {
        builder = builder.header(http::header::USER_AGENT, ua);
    }
    let request = builder.body(()).context("invalid request")?;

    let info = RequestInfo::from_http(&request, args.remote_addr.clone());
    Ok(match &args.country {
        Some(country) => info.with_country(country.clone()),
        None => info,
    })
}

fn print_decision(
    strategy: &dyn KeyStrategy,
    decision: &keyclass::error::Result<Decision>,
    json: bool,
) {
    if json {
        let value = match decision {
            Ok(Decision::Limited { key, limit, window }) => serde_json::json!({
                "strategy": strategy.name(),
                "decision": "limited",
                "key": key,
                "limit": limit,
                "window_secs": window.as_secs_f64(),
            }),
            Ok(Decision::Unlimited) => serde_json::json!({
                "strategy": strategy.name(),
                "decision": "unlimited",
            }),
            Err(e) => serde_json::json!({
                "strategy": strategy.name(),
                "decision": "error",
                "error": e.to_string(),
            }),
        };
        println!("{}", value);
    } else {
        match decision {
            Ok(decision) => println!("{:<16} {}", strategy.name(), decision),
            Err(e) => println!("{:<16} error: {}", strategy.name(), e),
        }
    }
}

async fn replay(
    strategies: &[Arc<dyn KeyStrategy>],
    request: &RequestInfo,
    repeat: u32,
) -> anyhow::Result<()> {
    for strategy in strategies {
        let limiter = RateLimiter::in_memory(strategy.clone());
        let mut allowed = 0u32;
        let mut limited = 0u32;
        let mut unlimited = 0u32;

        for _ in 0..repeat {
            match limiter.check(request).await {
                Ok(Outcome::Allowed { .. }) => allowed += 1,
                Ok(Outcome::Limited { .. }) => limited += 1,
                Ok(Outcome::Unlimited) => unlimited += 1,
                Err(e) => {
                    println!("{:<16} error: {}", strategy.name(), e);
                    break;
                }
            }
        }

        println!(
            "{:<16} allowed={} limited={} unlimited={}",
            strategy.name(),
            allowed,
            limited,
            unlimited
        );
    }
    Ok(())
}
