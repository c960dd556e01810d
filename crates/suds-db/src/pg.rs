//! Postgres-backed [`LaundryStore`].
//!
//! Every operation runs in a transaction that first pins the principal's
//! identity and role into the `suds.user_id` / `suds.role` settings, which
//! the row-level-security policies in the migrations evaluate. The change
//! feed is Postgres-native: NOTIFY triggers publish on `suds_changes` and a
//! background listener forwards payloads onto the broadcast bus.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use suds_schemas::{ChangeEvent, Expense, NewExpense, NewOrder, Order, OrderStatus, Principal};

use crate::error::{classify_db_error, StoreError};
use crate::{policy, validate_new_expense, validate_new_order, LaundryStore, OrderFilter};

/// NOTIFY channel the schema triggers publish on.
pub const CHANGE_CHANNEL: &str = "suds_changes";

const BUS_CAPACITY: usize = 1024;

pub struct PgStore {
    pool: PgPool,
    unit_price: Decimal,
    bus: broadcast::Sender<ChangeEvent>,
}

impl PgStore {
    /// Wrap an existing pool and attach the change-feed listener.
    pub fn new(pool: PgPool, unit_price: Decimal) -> Self {
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        spawn_change_listener(pool.clone(), bus.clone());
        Self {
            pool,
            unit_price,
            bus,
        }
    }

    /// Connect using SUDS_DATABASE_URL and attach the change-feed listener.
    pub async fn from_env(unit_price: Decimal) -> Result<Self, StoreError> {
        let pool = crate::connect_from_env().await?;
        Ok(Self::new(pool, unit_price))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction with the principal pinned into the RLS settings.
    async fn scoped_tx(
        &self,
        principal: &Principal,
    ) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        sqlx::query(
            "select set_config('suds.user_id', $1, true), set_config('suds.role', $2, true)",
        )
        .bind(principal.user_id.to_string())
        .bind(principal.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;
        Ok(tx)
    }
}

fn row_to_order(row: &PgRow) -> Result<Order, StoreError> {
    let status_text: String = row.try_get("status")?;
    let status =
        OrderStatus::from_str(&status_text).map_err(|e| StoreError::Internal(e.to_string()))?;

    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        client_name: row.try_get("client_name")?,
        load_count: row.try_get("load_count")?,
        instructions: row.try_get("instructions")?,
        price: row.try_get("price")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_expense(row: &PgRow) -> Result<Expense, StoreError> {
    Ok(Expense {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        description: row.try_get("description")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LaundryStore for PgStore {
    async fn create_order(
        &self,
        principal: &Principal,
        new: NewOrder,
    ) -> Result<Order, StoreError> {
        validate_new_order(&new)?;
        policy::allow_order_insert(principal, new.user_id)?;

        let price = suds_ledger::compute_price(new.load_count, self.unit_price);
        let order_id = Uuid::new_v4();

        let mut tx = self.scoped_tx(principal).await?;

        // The auth subsystem owns account rows; dev and test databases get a
        // stub row so the FK holds.
        sqlx::query("insert into users (id) values ($1) on conflict (id) do nothing")
            .bind(new.user_id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        let row = sqlx::query(
            r#"
            insert into orders (id, user_id, client_name, load_count, instructions, price)
            values ($1, $2, $3, $4, $5, $6)
            returning
              id, user_id, client_name, load_count, instructions, price, status,
              created_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(new.user_id)
        .bind(new.client_name.trim())
        .bind(new.load_count)
        .bind(&new.instructions)
        .bind(price)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let order = row_to_order(&row)?;
        tx.commit().await.map_err(classify_db_error)?;
        info!(order_id = %order.id, load_count = order.load_count, "order created");
        Ok(order)
    }

    async fn advance_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError> {
        policy::require_admin(principal, "advance order status")?;

        let mut tx = self.scoped_tx(principal).await?;

        let row = sqlx::query(
            r#"
            select
              id, user_id, client_name, load_count, instructions, price, status,
              created_at, updated_at
            from orders
            where id = $1
            for update
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .ok_or(StoreError::NotFound("order"))?;

        let order = row_to_order(&row)?;

        let Some(next) = order.status.next() else {
            // Terminal: deterministic no-op, row unchanged.
            tx.rollback().await.map_err(classify_db_error)?;
            return Ok(order);
        };

        // updated_at is refreshed by the BEFORE UPDATE trigger.
        let row = sqlx::query(
            r#"
            update orders
            set status = $2
            where id = $1
            returning
              id, user_id, client_name, load_count, instructions, price, status,
              created_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let updated = row_to_order(&row)?;
        tx.commit().await.map_err(classify_db_error)?;
        info!(order_id = %order_id, from = %order.status, to = %updated.status, "order advanced");
        Ok(updated)
    }

    async fn fetch_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError> {
        let mut tx = self.scoped_tx(principal).await?;

        let row = sqlx::query(
            r#"
            select
              id, user_id, client_name, load_count, instructions, price, status,
              created_at, updated_at
            from orders
            where id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .ok_or(StoreError::NotFound("order"))?;

        let order = row_to_order(&row)?;
        if !policy::allow_order_read(principal, &order) {
            // RLS already hides foreign rows; mirror that when it is off.
            return Err(StoreError::NotFound("order"));
        }
        tx.commit().await.map_err(classify_db_error)?;
        Ok(order)
    }

    async fn list_orders(
        &self,
        principal: &Principal,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.scoped_tx(principal).await?;

        let rows = match (policy::order_read_scope(principal), filter.active_only) {
            (policy::ReadScope::All, false) => {
                sqlx::query(
                    r#"
                    select
                      id, user_id, client_name, load_count, instructions, price, status,
                      created_at, updated_at
                    from orders
                    order by created_at desc
                    "#,
                )
                .fetch_all(&mut *tx)
                .await
            }
            (policy::ReadScope::All, true) => {
                sqlx::query(
                    r#"
                    select
                      id, user_id, client_name, load_count, instructions, price, status,
                      created_at, updated_at
                    from orders
                    where status <> 'Completed'
                    order by created_at desc
                    "#,
                )
                .fetch_all(&mut *tx)
                .await
            }
            (policy::ReadScope::Owner(owner), false) => {
                sqlx::query(
                    r#"
                    select
                      id, user_id, client_name, load_count, instructions, price, status,
                      created_at, updated_at
                    from orders
                    where user_id = $1
                    order by created_at desc
                    "#,
                )
                .bind(owner)
                .fetch_all(&mut *tx)
                .await
            }
            (policy::ReadScope::Owner(owner), true) => {
                sqlx::query(
                    r#"
                    select
                      id, user_id, client_name, load_count, instructions, price, status,
                      created_at, updated_at
                    from orders
                    where user_id = $1 and status <> 'Completed'
                    order by created_at desc
                    "#,
                )
                .bind(owner)
                .fetch_all(&mut *tx)
                .await
            }
        }
        .map_err(classify_db_error)?;

        let orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await.map_err(classify_db_error)?;
        Ok(orders)
    }

    async fn insert_expense(
        &self,
        principal: &Principal,
        new: NewExpense,
    ) -> Result<Expense, StoreError> {
        policy::require_admin(principal, "recording expenses")?;
        validate_new_expense(&new)?;

        let expense_id = Uuid::new_v4();
        let date = new.date.unwrap_or_else(Utc::now);

        let mut tx = self.scoped_tx(principal).await?;
        let row = sqlx::query(
            r#"
            insert into expenses (id, date, description, amount)
            values ($1, $2, $3, $4)
            returning id, date, description, amount, created_at
            "#,
        )
        .bind(expense_id)
        .bind(date)
        .bind(new.description.trim())
        .bind(new.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let expense = row_to_expense(&row)?;
        tx.commit().await.map_err(classify_db_error)?;
        info!(expense_id = %expense.id, amount = %expense.amount, "expense recorded");
        Ok(expense)
    }

    async fn list_expenses(&self, principal: &Principal) -> Result<Vec<Expense>, StoreError> {
        policy::require_admin(principal, "reading expenses")?;

        let mut tx = self.scoped_tx(principal).await?;
        let rows = sqlx::query(
            "select id, date, description, amount, created_at from expenses order by date desc",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let expenses = rows
            .iter()
            .map(row_to_expense)
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await.map_err(classify_db_error)?;
        Ok(expenses)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }
}

/// Forward `suds_changes` NOTIFY payloads onto the broadcast bus.
///
/// The listener reconnects with a fixed backoff after any connection loss.
/// Subscribers treat events as invalidation signals, so a gap during
/// reconnect only delays a re-read.
fn spawn_change_listener(pool: PgPool, bus: broadcast::Sender<ChangeEvent>) {
    tokio::spawn(async move {
        loop {
            match PgListener::connect_with(&pool).await {
                Ok(mut listener) => match listener.listen(CHANGE_CHANNEL).await {
                    Ok(()) => {
                        info!(channel = CHANGE_CHANNEL, "change feed attached");
                        loop {
                            match listener.recv().await {
                                Ok(notification) => {
                                    match serde_json::from_str::<ChangeEvent>(
                                        notification.payload(),
                                    ) {
                                        Ok(ev) => {
                                            let _ = bus.send(ev);
                                        }
                                        Err(e) => warn!(
                                            error = %e,
                                            payload = notification.payload(),
                                            "unparseable change payload"
                                        ),
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "change feed connection lost");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "change feed LISTEN failed"),
                },
                Err(e) => warn!(error = %e, "change feed connect failed"),
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });
}
