//! fetchq CLI: push requests through a serialized queue from the shell.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fetchq::config::Config;
use fetchq::telemetry::{TelemetryConfig, init_telemetry};
use fetchq::{BoxError, Error, HttpTransport, Middleware, Queue, Request, Response};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "fetchq", about = "Send HTTP requests one at a time, in order")]
struct Cli {
    /// Retry a request up to this many times on 5xx or transport failure
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a single GET request
    Get {
        url: String,
        /// Extra header as `name:value` (repeatable)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
    /// Send every request descriptor in a JSON-lines file
    Run {
        /// File with one JSON request descriptor per line
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "fetchq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let transport = HttpTransport::from_config(&config)?;
    let middleware = Middleware::new(summarize, |error: Error, _: &Request| Ok(error))
        .with_retries(cli.retries, is_retryable);
    let queue = Queue::with_middleware(transport, middleware)?;
    queue.on_unhandled_error(|error| eprintln!("warning: {error}"));

    let requests = match cli.command {
        Command::Get { url, headers } => {
            let mut request = Request::new(url);
            for header in headers {
                let (name, value) = header
                    .split_once(':')
                    .with_context(|| format!("header must be name:value, got {header:?}"))?;
                request = request.header(name.trim(), value.trim());
            }
            vec![request]
        }
        Command::Run { file } => read_requests(&file)?,
    };

    let pending: Vec<_> = requests
        .into_iter()
        .map(|request| queue.push(request))
        .collect();

    let mut failures = 0usize;
    for (index, outcome) in pending.into_iter().enumerate() {
        let line = match outcome.await {
            Ok(Some(response)) => json!({ "index": index, "response": response }),
            Ok(None) => json!({ "index": index, "response": null }),
            Err(error) => {
                failures += 1;
                json!({ "index": index, "error": error.to_string() })
            }
        };
        println!("{line}");
    }

    if failures > 0 {
        anyhow::bail!("{failures} request(s) failed");
    }
    Ok(())
}

fn read_requests(path: &Path) -> anyhow::Result<Vec<Request>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad request descriptor", path.display(), n + 1))
        })
        .collect()
}

/// Reduce a response to the JSON printed for it.
fn summarize(response: Response, _request: &Request) -> Result<Value, BoxError> {
    let body = response.json.unwrap_or(Value::String(response.text));
    Ok(json!({
        "status": response.status,
        "ok": response.ok,
        "url": response.url,
        "body": body,
    }))
}

/// Whether a summarized cycle should be retried: a failed exchange or a 5xx.
fn is_retryable(error: Option<&Error>, summary: Option<&Value>) -> bool {
    let server_error = summary
        .and_then(|summary| summary.get("status"))
        .and_then(Value::as_u64)
        .is_some_and(|status| status >= 500);
    error.is_some() || server_error
}
