//! tracesink-cli - submit event batches to a tracesink server
//!
//! # Subcommands
//! - `send --kind trace|graph <file.json> [--retries N]` - post one batch file
//! - `status`                                           - call GET /healthz
//!
//! A batch is all-or-nothing on the server side. When the server answers with
//! a 5xx or cannot be reached, the whole batch is resubmitted up to `--retries`
//! times; a 4xx means the batch itself is wrong and is never retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "tracesink-cli",
    version,
    about = "Submit trace and graph event batches to a tracesink server"
)]
struct Cli {
    /// tracesink HTTP server URL (overrides TRACESINK_URL env var)
    #[arg(long, env = "TRACESINK_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Post a JSON array of events as one batch
    Send {
        /// Which event stream the file holds
        #[arg(long, value_enum, default_value_t = BatchKind::Trace)]
        kind: BatchKind,

        /// Path to a JSON file containing an array of events
        file: PathBuf,

        /// Resubmit the whole batch this many times on transport errors or 5xx
        #[arg(long, default_value_t = 0)]
        retries: u32,

        /// Delay before the first resubmission, doubled on each attempt
        #[arg(long, default_value_t = 500)]
        backoff_ms: u64,
    },

    /// Check server liveness
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchKind {
    Trace,
    Graph,
}

impl BatchKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            BatchKind::Trace => "/events",
            BatchKind::Graph => "/graph-events",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

#[derive(Debug, Deserialize)]
pub struct InsertedResponse {
    pub inserted: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SendOutcome {
    pub inserted: u64,
    pub attempts: u32,
}

// ============================================================================
// Batch loading
// ============================================================================

/// Read a batch file and return its bytes with the element count.
pub fn load_batch(path: &Path) -> anyhow::Result<(Vec<u8>, usize)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value.as_array() {
        Some(items) => Ok((bytes, items.len())),
        None => bail!("{} must contain a JSON array of events", path.display()),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

/// Post one batch, resubmitting it whole on transport failures and 5xx.
pub fn post_batch(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &[u8],
    policy: RetryPolicy,
) -> anyhow::Result<SendOutcome> {
    let mut attempts = 0;
    let mut delay = policy.backoff;

    loop {
        attempts += 1;
        let last_error = match client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
        {
            Ok(resp) if resp.status().is_success() => {
                let parsed: InsertedResponse = resp
                    .json()
                    .context("failed to parse server response")?;
                return Ok(SendOutcome {
                    inserted: parsed.inserted,
                    attempts,
                });
            }
            Ok(resp) if resp.status().is_client_error() => {
                let status = resp.status();
                let text = resp.text().unwrap_or_default();
                bail!("batch rejected ({}): {}", status, text);
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().unwrap_or_default();
                format!("server returned {}: {}", status, text)
            }
            Err(e) => format!("connection failed to {}: {}", url, e),
        };

        if attempts > policy.retries {
            bail!(
                "batch not guaranteed persisted after {} attempt(s): {}",
                attempts,
                last_error
            );
        }
        eprintln!("tracesink-cli: {}; resubmitting batch", last_error);
        std::thread::sleep(delay);
        delay = delay.saturating_mul(2);
    }
}

fn do_send(
    server: &str,
    kind: BatchKind,
    file: &Path,
    policy: RetryPolicy,
) -> anyhow::Result<()> {
    let (body, count) = load_batch(file)?;
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    let url = format!("{}{}", server, kind.endpoint());
    let outcome = post_batch(&client, &url, &body, policy)?;

    if outcome.inserted != count as u64 {
        bail!(
            "server acknowledged {} of {} events",
            outcome.inserted,
            count
        );
    }
    println!("inserted {} events", outcome.inserted);
    Ok(())
}

/// Show the server liveness by calling GET /healthz.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let url = format!("{}/healthz", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            let ok = body["ok"].as_bool().unwrap_or(false);
            println!("tracesink server: {}", if ok { "ok" } else { "unknown" });
        }
        Ok(r) => bail!("server unhealthy (HTTP {})", r.status()),
        Err(e) => bail!("cannot reach {}: {}", url, e),
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Send {
            kind,
            file,
            retries,
            backoff_ms,
        } => do_send(
            &server,
            kind,
            &file,
            RetryPolicy {
                retries,
                backoff: Duration::from_millis(backoff_ms),
            },
        ),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("tracesink-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
