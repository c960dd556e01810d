//! Shared runtime state for suds-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The store behind the
//! trait object is either Postgres-backed or in-memory; handlers cannot tell
//! and tests exploit that.

use std::sync::Arc;

use suds_db::LaundryStore;

/// Static build metadata included in health responses.
#[derive(Clone, Copy, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LaundryStore>,
    pub build: BuildInfo,
    /// Server-held admin token. `None` means the admin role cannot be minted
    /// at all — the daemon boots fail-closed until `SUDS_ADMIN_TOKEN` is set.
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn LaundryStore>, admin_token: Option<String>) -> Self {
        Self {
            store,
            build: BuildInfo {
                service: "suds-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            admin_token,
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
