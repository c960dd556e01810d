//! Command handler modules for suds-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod db;
pub mod expense;
pub mod ledger;
pub mod order;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use suds_db::PgStore;
use suds_schemas::Principal;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// The acting principal for every CLI command: the shop operator.
pub fn operator() -> Principal {
    Principal::admin(Uuid::nil())
}

/// Connect a store using the configured unit price.
///
/// `SUDS_CONFIG` names the layered config paths (colon-separated); when it is
/// unset the built-in defaults apply.
pub async fn open_store() -> Result<PgStore> {
    let loaded = match std::env::var("SUDS_CONFIG") {
        Ok(raw) => {
            let paths: Vec<&str> = raw.split(':').filter(|p| !p.is_empty()).collect();
            suds_config::load_layered_yaml(&paths).context("loading config")?
        }
        Err(_) => suds_config::LoadedConfig::defaults()?,
    };
    debug!(config_hash = %loaded.config_hash, "config loaded");
    let store = PgStore::from_env(loaded.config.pricing.unit_price).await?;
    Ok(store)
}

/// Parse a `--amount`/price argument into a fixed-point value.
pub fn parse_money(raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .with_context(|| format!("not a monetary amount: '{raw}'"))
}

pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid {what} uuid: '{raw}'"))
}
