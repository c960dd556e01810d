//! Shared data types for the suds laundry-order tracker.
//!
//! Everything here is `Serialize + Deserialize` and carries no I/O. The store
//! and daemon crates exchange these types; no business rules live here beyond
//! the status pipeline itself, which is a property of the `OrderStatus` type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderStatus — the five-stage pipeline
// ---------------------------------------------------------------------------

/// An order's position in the fixed status pipeline.
///
/// The pipeline is linear: no branches, no cycles, no skips. `next()` is the
/// only way to move; there is no arbitrary assignment path through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Pending Pickup")]
    PendingPickup,
    #[serde(rename = "Washing")]
    Washing,
    #[serde(rename = "Folding")]
    Folding,
    #[serde(rename = "Ready for Return")]
    ReadyForReturn,
    #[serde(rename = "Completed")]
    Completed,
}

impl OrderStatus {
    /// The full pipeline in traversal order.
    pub const PIPELINE: [OrderStatus; 5] = [
        OrderStatus::PendingPickup,
        OrderStatus::Washing,
        OrderStatus::Folding,
        OrderStatus::ReadyForReturn,
        OrderStatus::Completed,
    ];

    /// Initial state assigned at order creation.
    pub const INITIAL: OrderStatus = OrderStatus::PendingPickup;

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPickup => "Pending Pickup",
            OrderStatus::Washing => "Washing",
            OrderStatus::Folding => "Folding",
            OrderStatus::ReadyForReturn => "Ready for Return",
            OrderStatus::Completed => "Completed",
        }
    }

    /// Next stage in the pipeline, or `None` at the terminal state.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::PendingPickup => Some(OrderStatus::Washing),
            OrderStatus::Washing => Some(OrderStatus::Folding),
            OrderStatus::Folding => Some(OrderStatus::ReadyForReturn),
            OrderStatus::ReadyForReturn => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Pickup" => Ok(OrderStatus::PendingPickup),
            "Washing" => Ok(OrderStatus::Washing),
            "Folding" => Ok(OrderStatus::Folding),
            "Ready for Return" => Ok(OrderStatus::ReadyForReturn),
            "Completed" => Ok(OrderStatus::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Order / Expense rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Owning account. `None` only transiently while an owning account is
    /// being deleted; the row itself is removed by cascade.
    pub user_id: Option<Uuid>,
    pub client_name: String,
    pub load_count: i32,
    pub instructions: Option<String>,
    /// Fixed-point, two fraction digits. Never a float.
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    /// Occurrence time; defaults to creation time when not supplied.
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Payload for order creation. `price` and `status` are never caller-supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub client_name: String,
    pub load_count: i32,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    pub amount: Decimal,
}

// ---------------------------------------------------------------------------
// Principal / Role
// ---------------------------------------------------------------------------

/// Server-derived role claim. The admin role is only ever minted by the
/// daemon after checking the server-held admin token; it is never a
/// client-held flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

/// An authenticated caller as seen by the store layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---------------------------------------------------------------------------
// Change feed events
// ---------------------------------------------------------------------------

/// Table a change event originates from. Matches `tg_table_name` in the
/// Postgres NOTIFY trigger payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTable {
    Orders,
    Expenses,
}

impl FeedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTable::Orders => "orders",
            FeedTable::Expenses => "expenses",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One insert/update/delete notification from the store.
///
/// Consumers treat this as a cache-invalidation signal and re-read the
/// affected table; the event carries identity, not row contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: FeedTable,
    pub op: ChangeOp,
    pub id: Uuid,
    /// Owner of the affected row, when the table has one (orders only).
    /// Used to scope customer subscriptions to their own rows.
    pub owner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_traverses_all_five_stages_in_order() {
        let mut st = OrderStatus::INITIAL;
        let mut seen = vec![st];
        while let Some(next) = st.next() {
            st = next;
            seen.push(st);
        }
        assert_eq!(seen, OrderStatus::PIPELINE);
        assert!(st.is_terminal());
    }

    #[test]
    fn terminal_state_has_no_next() {
        assert_eq!(OrderStatus::Completed.next(), None);
    }

    #[test]
    fn status_round_trips_through_display_strings() {
        for st in OrderStatus::PIPELINE {
            assert_eq!(st.as_str().parse::<OrderStatus>().unwrap(), st);
        }
        assert!("Ironing".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_display_string() {
        let json = serde_json::to_string(&OrderStatus::ReadyForReturn).unwrap();
        assert_eq!(json, "\"Ready for Return\"");
    }

    #[test]
    fn change_event_payload_shape_matches_trigger_json() {
        let ev: ChangeEvent = serde_json::from_str(
            r#"{"table":"orders","op":"update","id":"7f3d6a6e-93a3-4ad5-b6b8-0e3b3a6c2f11","owner_id":null}"#,
        )
        .unwrap();
        assert_eq!(ev.table, FeedTable::Orders);
        assert_eq!(ev.op, ChangeOp::Update);
        assert_eq!(ev.owner_id, None);
    }
}
