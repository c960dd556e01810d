//! Persistent store for laundry orders and expenses.
//!
//! Two tables, Postgres via SQLx. Writes validate input, enforce the access
//! policy, and rely on the database for the rest: CHECK constraints back the
//! validation, row-level-security policies back the access rules, a trigger
//! refreshes `orders.updated_at`, and NOTIFY triggers feed the change bus.
//!
//! [`LaundryStore`] is the seam between the daemon and the storage backend;
//! [`PgStore`] is the production implementation, [`MemStore`] the in-memory
//! one used by tests and the daemon's dev mode.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::broadcast;
use uuid::Uuid;

use suds_schemas::{ChangeEvent, Expense, NewExpense, NewOrder, Order, Principal};

pub mod error;
pub mod mem;
pub mod pg;
pub mod policy;

pub use error::StoreError;
pub use mem::MemStore;
pub use pg::PgStore;

pub const ENV_DB_URL: &str = "SUDS_DATABASE_URL";

/// Connect to Postgres using SUDS_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool, StoreError> {
    let url = std::env::var(ENV_DB_URL)
        .map_err(|_| StoreError::Config(format!("missing env var {ENV_DB_URL}")))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Config(format!("db migrate failed: {e}")))?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus, StoreError> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DbStatus {
        ok,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Count orders still mid-pipeline. Used by the CLI migrate guardrail to
/// refuse schema changes under a live order book unless forced.
///
/// Pins the admin role for the count: row-level security is forced on the
/// orders table, so an unpinned connection would always see zero rows.
pub async fn count_active_orders(pool: &PgPool) -> Result<i64, StoreError> {
    // If schema doesn't exist yet, treat as 0 (safe) rather than failing.
    let st = status(pool).await?;
    if !st.has_orders_table {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    sqlx::query("select set_config('suds.role', 'admin', true)")
        .execute(&mut *tx)
        .await?;
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from orders
        where status <> 'Completed'
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(n)
}

// ---------------------------------------------------------------------------
// Write-time validation
// ---------------------------------------------------------------------------

/// Constraints enforced before any row is written. The schema carries
/// matching CHECK constraints, so a bypassing writer is rejected by the
/// database with the same semantics.
pub fn validate_new_order(new: &NewOrder) -> Result<(), StoreError> {
    if new.client_name.trim().is_empty() {
        return Err(StoreError::Validation(
            "client_name must not be empty".to_string(),
        ));
    }
    if new.load_count < 1 {
        return Err(StoreError::Validation(format!(
            "load_count must be >= 1, got {}",
            new.load_count
        )));
    }
    Ok(())
}

pub fn validate_new_expense(new: &NewExpense) -> Result<(), StoreError> {
    if new.description.trim().is_empty() {
        return Err(StoreError::Validation(
            "description must not be empty".to_string(),
        ));
    }
    if new.amount <= rust_decimal::Decimal::ZERO {
        return Err(StoreError::Validation(format!(
            "amount must be > 0, got {}",
            new.amount
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Filter for order listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    /// Only orders whose status is not Completed.
    pub active_only: bool,
}

/// The storage seam used by the daemon and CLI.
///
/// Every method takes the acting [`Principal`]; implementations apply the
/// rules in [`policy`] before touching rows. `subscribe` hands out a
/// receiver on the store's change bus — one event per committed
/// insert/update/delete, to be treated as an invalidation signal.
#[async_trait]
pub trait LaundryStore: Send + Sync {
    /// Validate, price, and persist a new order with status Pending Pickup.
    async fn create_order(
        &self,
        principal: &Principal,
        new: NewOrder,
    ) -> Result<Order, StoreError>;

    /// Advance an order one pipeline stage. Admin only. Advancing a
    /// Completed order is a no-op returning the unchanged row.
    async fn advance_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError>;

    async fn fetch_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError>;

    async fn list_orders(
        &self,
        principal: &Principal,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, StoreError>;

    /// Record an expense. Admin only. Expenses are append-only.
    async fn insert_expense(
        &self,
        principal: &Principal,
        new: NewExpense,
    ) -> Result<Expense, StoreError>;

    async fn list_expenses(&self, principal: &Principal) -> Result<Vec<Expense>, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
