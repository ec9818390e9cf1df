//! Worker binary: serves the site-analysis tools over stdio.
//!
//! stdout carries JSON-RPC; logs go to stderr so the protocol stream stays
//! clean.

use sitebridge::config::Config;
use sitebridge::worker::{server, WorkerContext, WorkerRegistry};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitebridge=debug,info".parse().expect("valid env filter")),
        )
        .init();

    let config = Config::from_env();
    let registry = WorkerRegistry::new();
    let ctx = WorkerContext::new(config.base_service_url, config.user_agent);

    server::serve(&registry, &ctx, tokio::io::stdin(), tokio::io::stdout()).await
}
