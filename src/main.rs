//!
//! fluxauth server binary
//! ----------------------
//! Starts the privilege-check HTTP surface. Configuration comes from an
//! optional JSON file, then `FLUXAUTH_*` environment variables, then CLI flags.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use fluxauth::config::AuthConfig;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("fluxauth\n\nUSAGE:\n  fluxauth [--config PATH] [--port N] [--admin ZELID] [--seed PATH]\n\nOPTIONS:\n  --config PATH   JSON configuration file\n  --port N        HTTP port (env: FLUXAUTH_HTTP_PORT, default 16127)\n  --admin ZELID   Node operator zelid (env: FLUXAUTH_ADMIN_ZELID)\n  --seed PATH     JSON seed for the in-memory store (env: FLUXAUTH_SEED_FILE)\n");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log filter")?;
    fmt().with_env_filter(filter).init();

    let base = match arg_value(&args, "--config") {
        Some(path) => AuthConfig::from_json_file(&PathBuf::from(&path))
            .with_context(|| format!("While loading config {}", path))?,
        None => AuthConfig::default(),
    };
    let mut config = base.with_overrides(|k| env::var(k).ok())?;

    // CLI arguments override environment
    if let Some(port) = arg_value(&args, "--port") {
        config.http_port = port.parse::<u16>().with_context(|| format!("Invalid --port '{}'", port))?;
    }
    if let Some(admin) = arg_value(&args, "--admin") {
        config.admin_zelid = admin;
    }
    if let Some(seed) = arg_value(&args, "--seed") {
        config.seed_file = Some(PathBuf::from(seed));
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "fluxauth",
        "fluxauth starting: RUST_LOG='{}', http_port={}, admin_zelid='{}', fluxteam_zelid='{}'",
        rust_log, config.http_port, config.admin_zelid, config.fluxteam_zelid
    );

    fluxauth::server::run(config).await
}
