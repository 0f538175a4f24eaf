//! nt-stream-demo: 使用脚本化上游演示限流、熔断与流桥接的命令行工具
//!
//! Usage:
//!   nt-stream-demo stream [--config <file>] [--json-logs]   Stream a scripted answer to stdout
//!   nt-stream-demo burst  [--config <file>] [--json-logs]   Fire requests until the limiter rejects
//!   nt-stream-demo outage [--config <file>] [--json-logs]   Fail upstream until the breaker opens

use anyhow::{bail, Context};
use neural_terminal::logging::{self, LogFormat};
use neural_terminal::source::{Script, ScriptedSource};
use neural_terminal::{
    CompletionClient, CompletionCollector, CompletionRequest, Error, Message, ResilienceConfig,
    UpstreamError,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const MODEL: &str = "meta/llama-3.1-8b-instruct";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let format = if args.iter().any(|a| a == "--json-logs") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init(format, "info").context("logging setup")?;
    let config = load_config(&args[2..])?;

    match args[1].as_str() {
        "stream" => cmd_stream(config),
        "burst" => cmd_burst(config),
        "outage" => cmd_outage(config),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"nt-stream-demo: resilience layer demo against a scripted upstream

USAGE:
    nt-stream-demo <COMMAND> [OPTIONS]

COMMANDS:
    stream      Stream a scripted answer chunk by chunk
    burst       Send requests back to back until the rate limiter rejects one
    outage      Fail the upstream until the circuit breaker opens
    help        Show this help message

OPTIONS:
    --config <file>     YAML resilience configuration
    --json-logs         Emit logs as JSON

ENVIRONMENT:
    NT_RATE_LIMIT_RPM, NT_RATE_LIMIT_BURST, NT_BREAKER_FAILURE_THRESHOLD,
    NT_BREAKER_RECOVERY_SECS, NT_STREAM_CHUNK_TIMEOUT_MS, NT_STREAM_QUEUE_CAPACITY
    RUST_LOG            Log filter (default: info)"#
    );
}

fn load_config(args: &[String]) -> anyhow::Result<ResilienceConfig> {
    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let Some(path) = args.get(i + 1) else {
                bail!("--config needs a file path");
            };
            ResilienceConfig::from_yaml_file(path)
                .with_context(|| format!("loading {path}"))?
        }
        None => ResilienceConfig::default(),
    };
    config.apply_env_overrides().context("environment overrides")?;
    Ok(config)
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new(
        MODEL,
        vec![
            Message::system("You are a helpful terminal assistant."),
            Message::user(text),
        ],
    )
}

fn cmd_stream(config: ResilienceConfig) -> anyhow::Result<()> {
    let source = ScriptedSource::new()
        .with_chunk_delay(Duration::from_millis(40))
        .with_fallback(Script::reply(
            MODEL,
            &["The ", "bridge ", "delivers ", "chunks ", "in ", "order."],
        ));
    let client = CompletionClient::builder()
        .config(config)
        .build(Arc::new(source))?;

    let stream = client.stream_chat(request("How does streaming work?"))?;
    let mut collector = CompletionCollector::new();
    let mut stdout = std::io::stdout();
    let meta = collector.drive(
        stream,
        |delta| {
            let _ = write!(stdout, "{delta}");
            let _ = stdout.flush();
        },
        |_| {},
    )?;
    println!();

    if let Some(meta) = meta {
        println!("metadata: {}", serde_json::to_string_pretty(&meta)?);
    }
    println!("breaker: {:?}", client.signals().circuit_breaker.state);
    Ok(())
}

fn cmd_burst(config: ResilienceConfig) -> anyhow::Result<()> {
    let source = ScriptedSource::new().with_fallback(Script::reply(MODEL, &["ok"]));
    let client = CompletionClient::builder()
        .config(config)
        .build(Arc::new(source))?;

    for n in 1.. {
        match client.complete(&request("ping")) {
            Ok(completion) => println!("request {n}: {}", completion.content),
            Err(e @ Error::RateLimitExceeded { .. }) => {
                println!("request {n}: {e}");
                println!("user sees: {}", e.user_message());
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn cmd_outage(config: ResilienceConfig) -> anyhow::Result<()> {
    let threshold = config.circuit_breaker.failure_threshold;
    let source = ScriptedSource::new().with_fallback(Script::fail_after(
        &["partial "],
        UpstreamError::ModelUnavailable {
            model_id: Some(MODEL.into()),
        },
    ));
    // Keep the limiter out of the way.
    let config = ResilienceConfig {
        rate_limit: config
            .rate_limit
            .with_burst_size(threshold.saturating_add(2)),
        ..config
    };
    let client = CompletionClient::builder()
        .config(config)
        .build(Arc::new(source))?;

    for n in 1..=threshold.saturating_add(1) {
        let stream = match client.stream_chat(request("hello?")) {
            Ok(stream) => stream,
            Err(e) => {
                println!("attempt {n}: rejected: {e}");
                println!("user sees: {}", e.user_message());
                break;
            }
        };
        let mut collector = CompletionCollector::new();
        if let Err(e) = collector.drive(stream, |_| {}, |_| {}) {
            println!(
                "attempt {n}: failed after {:?}: {} (code {})",
                collector.content(),
                e,
                e.code()
            );
        }
    }
    let signals = client.signals();
    println!(
        "breaker: {:?}, failures={}, reopens in {:?}",
        signals.circuit_breaker.state,
        signals.circuit_breaker.failure_count,
        signals.circuit_breaker.open_remaining
    );
    Ok(())
}
