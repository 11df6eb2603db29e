use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::Value;
use snapsecret_server::clock::{Clock, SystemClock};
use snapsecret_server::store::SecretStore;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "snapsecret", about = "Snapsecret — one-time secret sharing", version)]
struct Cli {
    /// Snapsecret server URL (default: http://localhost:8080 or $SNAPSECRET_SERVER)
    #[arg(long, env = "SNAPSECRET_SERVER", default_value = "http://localhost:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Snapsecret HTTP server
    Serve {
        /// Port to listen on (default: $SNAPSECRET_PORT or 8080)
        #[arg(long, env = "SNAPSECRET_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $SNAPSECRET_HOST or 0.0.0.0)
        #[arg(long, env = "SNAPSECRET_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Keep secrets in memory only; nothing survives a restart
        #[arg(long)]
        in_memory: bool,
    },
    /// Store an already-encrypted secret from a JSON file (`-` for stdin)
    Put {
        /// Path to a `{"secret": {...}}` request body
        #[arg(name = "FILE", default_value = "-")]
        input: String,
    },
    /// Retrieve (and destroy) a secret
    Get {
        /// Secret id returned by `put`
        secret_id: String,
    },
    /// Request an object key and a one-hour PUT URL for an encrypted file
    UploadTarget,
    /// Delete all expired secrets from the local database immediately
    Prune,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } | Commands::Prune => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SNAPSECRET_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            in_memory,
        } => cmd_serve(host, port, in_memory).await,
        Commands::Put { input } => cmd_put(&cli.server, &input).await,
        Commands::Get { secret_id } => cmd_get(&cli.server, &secret_id).await,
        Commands::UploadTarget => cmd_upload_target(&cli.server).await,
        Commands::Prune => cmd_prune(),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16, in_memory: bool) -> Result<()> {
    let cfg = snapsecret_server::ServerConfig {
        host,
        port,
        in_memory,
        ..Default::default()
    };

    snapsecret_server::run(cfg).await
}

async fn cmd_put(server: &str, input: &str) -> Result<()> {
    let body = read_input(input)?;
    let resp = Client::new()
        .put(format!("{}/secret", server.trim_end_matches('/')))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    let secret_id = json["secret_id"]
        .as_str()
        .context("response has no secret_id")?;
    println!("{secret_id}");
    Ok(())
}

async fn cmd_get(server: &str, secret_id: &str) -> Result<()> {
    let resp = Client::new()
        .get(format!("{}/secret/{}", server.trim_end_matches('/'), secret_id))
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    println!("{}", serde_json::to_string_pretty(&json["secret"])?);
    Ok(())
}

async fn cmd_upload_target(server: &str) -> Result<()> {
    let resp = Client::new()
        .post(format!("{}/upload", server.trim_end_matches('/')))
        .send()
        .await
        .context("HTTP request failed")?;

    let json = expect_success(resp).await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn cmd_prune() -> Result<()> {
    let cfg = snapsecret_server::ServerConfig::default();
    let store = snapsecret_server::server::open_redb(&cfg)?;
    let removed = store.prune(SystemClock.now())?;
    println!("pruned {} expired secret(s)", removed.len());
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read request body from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(input).with_context(|| format!("read request body: {input}"))
    }
}

async fn expect_success(resp: Response) -> Result<Value> {
    let status = resp.status();
    let json: Value = resp.json().await.unwrap_or_default();
    if status.is_success() {
        Ok(json)
    } else {
        let error = json["error"].as_str().unwrap_or("unknown error");
        anyhow::bail!("server returned {status}: {error}");
    }
}
