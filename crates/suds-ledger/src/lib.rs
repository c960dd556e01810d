//! Pricing rule and ledger aggregation.
//!
//! Pure functions over snapshots. Nothing here touches the store; the daemon
//! and CLI fetch a snapshot and derive the figures on every refresh. No
//! incremental state is kept — a snapshot is re-aggregated wholesale, so the
//! result is never stale relative to the rows it was computed from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use suds_schemas::{Expense, Order, OrderStatus};

/// Default price per load, in currency units. Deployments override this via
/// the `pricing.unit_price` config key.
pub const DEFAULT_UNIT_PRICE: Decimal = Decimal::from_parts(7500, 0, 0, false, 2);

/// `load_count × unit_price`, fixed to two fraction digits.
///
/// Pure; callers validate `load_count ≥ 1` before pricing (order validation
/// rejects non-positive counts, so this never sees one on a persisted path).
pub fn compute_price(load_count: i32, unit_price: Decimal) -> Decimal {
    (Decimal::from(load_count) * unit_price).round_dp(2)
}

/// The three derived ledger figures plus the active-order count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Σ price over Completed orders.
    pub total_revenue: Decimal,
    /// Σ amount over all expenses.
    pub total_expenses: Decimal,
    /// Revenue minus expenses. Negative when expenses exceed revenue.
    pub net_profit: Decimal,
    /// Orders not yet Completed.
    pub active_orders: usize,
}

/// Derive the ledger figures from a full snapshot of both tables.
pub fn aggregate(orders: &[Order], expenses: &[Expense]) -> LedgerTotals {
    let total_revenue: Decimal = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .map(|o| o.price)
        .sum();

    let total_expenses: Decimal = expenses.iter().map(|e| e.amount).sum();

    LedgerTotals {
        total_revenue,
        total_expenses,
        net_profit: total_revenue - total_expenses,
        active_orders: orders
            .iter()
            .filter(|o| o.status != OrderStatus::Completed)
            .count(),
    }
}

/// Orders still in the pipeline, preserving input order.
pub fn active_orders(orders: &[Order]) -> Vec<&Order> {
    orders
        .iter()
        .filter(|o| o.status != OrderStatus::Completed)
        .collect()
}

/// Orders that reached the terminal state, preserving input order.
pub fn completed_orders(orders: &[Order]) -> Vec<&Order> {
    orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .collect()
}
