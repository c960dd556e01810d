//! suds-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config, picks
//! the store backend, wires middleware, and starts the HTTP server.  All
//! route handlers live in `routes.rs`; all shared state types live in
//! `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use suds_daemon::{routes, state};
use suds_db::{LaundryStore, MemStore, PgStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let admin_token = std::env::var("SUDS_ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
    if admin_token.is_none() {
        warn!("SUDS_ADMIN_TOKEN unset: admin role cannot be minted this run");
    }

    let unit_price = loaded.config.pricing.unit_price;
    let store: Arc<dyn LaundryStore> = if std::env::var(suds_db::ENV_DB_URL).is_ok() {
        let pg = PgStore::from_env(unit_price)
            .await
            .context("connecting to postgres")?;
        info!("store backend: postgres");
        Arc::new(pg)
    } else {
        warn!(
            "{} unset: falling back to the in-memory store (data is lost on exit)",
            suds_db::ENV_DB_URL
        );
        Arc::new(MemStore::new(unit_price))
    };

    let shared = Arc::new(state::AppState::new(store, admin_token));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&loaded.config.daemon.bind_addr)?;
    info!("suds-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Load layered YAML config from `SUDS_CONFIG` (colon-separated paths), or
/// fall back to built-in defaults when the variable is unset.
fn load_config() -> anyhow::Result<suds_config::LoadedConfig> {
    match std::env::var("SUDS_CONFIG") {
        Ok(raw) => {
            let paths: Vec<&str> = raw.split(':').filter(|p| !p.is_empty()).collect();
            suds_config::load_layered_yaml(&paths).context("loading config")
        }
        Err(_) => suds_config::LoadedConfig::defaults().context("building default config"),
    }
}

/// Bind address: env var wins, then config, then the compiled-in default.
/// A present-but-unparseable value is a startup error, not a silent
/// fallback — a typo must never move the listen address.
fn bind_addr(from_config: &Option<String>) -> anyhow::Result<SocketAddr> {
    if let Ok(raw) = std::env::var("SUDS_DAEMON_ADDR") {
        return raw
            .parse()
            .with_context(|| format!("SUDS_DAEMON_ADDR is not a socket address: '{raw}'"));
    }
    if let Some(raw) = from_config {
        return raw
            .parse()
            .with_context(|| format!("daemon.bind_addr is not a socket address: '{raw}'"));
    }
    Ok(SocketAddr::from(([127, 0, 0, 1], 8787)))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    // All cases clear SUDS_DAEMON_ADDR in one test to avoid env races
    // between parallel tests.
    #[test]
    fn bind_addr_resolution_and_rejection() {
        std::env::remove_var("SUDS_DAEMON_ADDR");

        // No env, no config: compiled-in default.
        let addr = bind_addr(&None).unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8787)));

        // Config value parses.
        let addr = bind_addr(&Some("0.0.0.0:9000".to_string())).unwrap();
        assert_eq!(addr, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());

        // Unparseable config value errors instead of falling back.
        let err = bind_addr(&Some("not-an-addr".to_string())).unwrap_err();
        assert!(err.to_string().contains("not-an-addr"));

        // Unparseable env value errors even when the config is valid.
        std::env::set_var("SUDS_DAEMON_ADDR", "127.0.0.1:nope");
        let err = bind_addr(&Some("0.0.0.0:9000".to_string())).unwrap_err();
        assert!(err.to_string().contains("SUDS_DAEMON_ADDR"));
        std::env::remove_var("SUDS_DAEMON_ADDR");
    }
}
