//! Request and response types for all suds-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded by
//! Axum and decoded by tests. `Order`, `Expense`, and `LedgerTotals` are
//! returned as-is from their home crates; no business logic lives here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use suds_schemas::FeedTable;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Body for any refused or failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "validation" | "authorization" | "not_found" | "transport" | ...
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub client_name: String,
    pub load_count: i32,
    pub instructions: Option<String>,
    /// Owner override; only meaningful for admins creating on a customer's
    /// behalf. Customers own what they create.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    pub amount: Decimal,
    /// Occurrence time; omitted = now.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrdersQuery {
    /// When true, only orders still in the pipeline.
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StreamQuery {
    /// Restrict the stream to one table; omitted = both.
    pub table: Option<FeedTable>,
}
