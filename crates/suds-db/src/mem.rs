//! In-memory [`LaundryStore`].
//!
//! Same validation, policy, and change-feed semantics as [`crate::PgStore`],
//! minus the database. Backs the daemon's dev mode and the in-process router
//! tests, and publishes its own change events since there is no NOTIFY
//! trigger to do it.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use suds_schemas::{
    ChangeEvent, ChangeOp, Expense, FeedTable, NewExpense, NewOrder, Order, OrderStatus,
    Principal,
};

use crate::error::StoreError;
use crate::{policy, validate_new_expense, validate_new_order, LaundryStore, OrderFilter};

const BUS_CAPACITY: usize = 1024;

#[derive(Default)]
struct Inner {
    orders: Vec<Order>,
    expenses: Vec<Expense>,
}

pub struct MemStore {
    unit_price: Decimal,
    inner: RwLock<Inner>,
    bus: broadcast::Sender<ChangeEvent>,
}

impl MemStore {
    pub fn new(unit_price: Decimal) -> Self {
        let (bus, _rx) = broadcast::channel(BUS_CAPACITY);
        Self {
            unit_price,
            inner: RwLock::new(Inner::default()),
            bus,
        }
    }

    fn publish(&self, table: FeedTable, op: ChangeOp, id: Uuid, owner_id: Option<Uuid>) {
        let _ = self.bus.send(ChangeEvent {
            table,
            op,
            id,
            owner_id,
        });
    }
}

#[async_trait]
impl LaundryStore for MemStore {
    async fn create_order(
        &self,
        principal: &Principal,
        new: NewOrder,
    ) -> Result<Order, StoreError> {
        validate_new_order(&new)?;
        policy::allow_order_insert(principal, new.user_id)?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: Some(new.user_id),
            client_name: new.client_name.trim().to_string(),
            load_count: new.load_count,
            instructions: new.instructions,
            price: suds_ledger::compute_price(new.load_count, self.unit_price),
            status: OrderStatus::INITIAL,
            created_at: now,
            updated_at: now,
        };

        self.inner.write().await.orders.push(order.clone());
        self.publish(FeedTable::Orders, ChangeOp::Insert, order.id, order.user_id);
        Ok(order)
    }

    async fn advance_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError> {
        policy::require_admin(principal, "advance order status")?;

        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::NotFound("order"))?;

        let Some(next) = order.status.next() else {
            // Terminal: deterministic no-op, no event.
            return Ok(order.clone());
        };

        order.status = next;
        order.updated_at = Utc::now();
        let snapshot = order.clone();
        drop(inner);

        self.publish(
            FeedTable::Orders,
            ChangeOp::Update,
            snapshot.id,
            snapshot.user_id,
        );
        Ok(snapshot)
    }

    async fn fetch_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<Order, StoreError> {
        let inner = self.inner.read().await;
        let order = inner
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::NotFound("order"))?;

        if !policy::allow_order_read(principal, order) {
            // Foreign rows are hidden, not refused.
            return Err(StoreError::NotFound("order"));
        }
        Ok(order.clone())
    }

    async fn list_orders(
        &self,
        principal: &Principal,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, StoreError> {
        let scope = policy::order_read_scope(principal);
        let inner = self.inner.read().await;

        let mut orders: Vec<Order> = inner
            .orders
            .iter()
            .filter(|o| match scope {
                policy::ReadScope::All => true,
                policy::ReadScope::Owner(u) => o.user_id == Some(u),
            })
            .filter(|o| !filter.active_only || o.status != OrderStatus::Completed)
            .cloned()
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn insert_expense(
        &self,
        principal: &Principal,
        new: NewExpense,
    ) -> Result<Expense, StoreError> {
        policy::require_admin(principal, "recording expenses")?;
        validate_new_expense(&new)?;

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            date: new.date.unwrap_or(now),
            description: new.description.trim().to_string(),
            amount: new.amount.round_dp(2),
            created_at: now,
        };

        self.inner.write().await.expenses.push(expense.clone());
        self.publish(FeedTable::Expenses, ChangeOp::Insert, expense.id, None);
        Ok(expense)
    }

    async fn list_expenses(&self, principal: &Principal) -> Result<Vec<Expense>, StoreError> {
        policy::require_admin(principal, "reading expenses")?;

        let inner = self.inner.read().await;
        let mut expenses = inner.expenses.clone();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(expenses)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store() -> MemStore {
        MemStore::new(dec!(75.00))
    }

    fn new_order(user_id: Uuid, load_count: i32) -> NewOrder {
        NewOrder {
            user_id,
            client_name: "Ama Mensah".to_string(),
            load_count,
            instructions: Some("no starch".to_string()),
        }
    }

    #[tokio::test]
    async fn create_order_prices_and_starts_pending() {
        let st = store();
        let uid = Uuid::new_v4();
        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 3))
            .await
            .unwrap();

        assert_eq!(order.price, dec!(225.00));
        assert_eq!(order.status, OrderStatus::PendingPickup);
        assert_eq!(order.user_id, Some(uid));
    }

    #[tokio::test]
    async fn zero_load_count_is_rejected_and_nothing_persists() {
        let st = store();
        let uid = Uuid::new_v4();
        let err = st
            .create_order(&Principal::customer(uid), new_order(uid, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let orders = st
            .list_orders(&Principal::admin(uid), OrderFilter::default())
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn empty_client_name_is_rejected() {
        let st = store();
        let uid = Uuid::new_v4();
        let mut new = new_order(uid, 1);
        new.client_name = "   ".to_string();
        let err = st
            .create_order(&Principal::customer(uid), new)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn advance_walks_the_pipeline_then_noops() {
        let st = store();
        let uid = Uuid::new_v4();
        let admin = Principal::admin(Uuid::new_v4());
        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let o = st.advance_order(&admin, order.id).await.unwrap();
            seen.push(o.status);
        }
        assert_eq!(
            seen,
            vec![
                OrderStatus::Washing,
                OrderStatus::Folding,
                OrderStatus::ReadyForReturn,
                OrderStatus::Completed,
            ]
        );

        // Fifth advance: no-op, still Completed.
        let o = st.advance_order(&admin, order.id).await.unwrap();
        assert_eq!(o.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn advance_refreshes_updated_at() {
        let st = store();
        let uid = Uuid::new_v4();
        let admin = Principal::admin(Uuid::new_v4());
        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();

        let advanced = st.advance_order(&admin, order.id).await.unwrap();
        assert!(advanced.updated_at >= order.updated_at);
        assert_eq!(advanced.created_at, order.created_at);
    }

    #[tokio::test]
    async fn customer_cannot_advance() {
        let st = store();
        let uid = Uuid::new_v4();
        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();

        let err = st
            .advance_order(&Principal::customer(uid), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Authorization(_)));
    }

    #[tokio::test]
    async fn customer_list_is_owner_scoped() {
        let st = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        st.create_order(&Principal::customer(alice), new_order(alice, 1))
            .await
            .unwrap();
        st.create_order(&Principal::customer(bob), new_order(bob, 2))
            .await
            .unwrap();

        let mine = st
            .list_orders(&Principal::customer(alice), OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, Some(alice));

        let all = st
            .list_orders(&Principal::admin(alice), OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn customer_cannot_create_for_another_account() {
        let st = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let err = st
            .create_order(&Principal::customer(alice), new_order(bob, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Authorization(_)));
    }

    #[tokio::test]
    async fn active_filter_excludes_completed() {
        let st = store();
        let uid = Uuid::new_v4();
        let admin = Principal::admin(Uuid::new_v4());
        let done = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();
        for _ in 0..4 {
            st.advance_order(&admin, done.id).await.unwrap();
        }
        st.create_order(&Principal::customer(uid), new_order(uid, 2))
            .await
            .unwrap();

        let active = st
            .list_orders(
                &admin,
                OrderFilter { active_only: true },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, OrderStatus::PendingPickup);
    }

    #[tokio::test]
    async fn expenses_are_admin_only_and_validated() {
        let st = store();
        let admin = Principal::admin(Uuid::new_v4());
        let customer = Principal::customer(Uuid::new_v4());

        let err = st
            .insert_expense(
                &customer,
                NewExpense {
                    date: None,
                    description: "soap".to_string(),
                    amount: dec!(10.00),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Authorization(_)));

        let err = st
            .insert_expense(
                &admin,
                NewExpense {
                    date: None,
                    description: "soap".to_string(),
                    amount: dec!(0.00),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let exp = st
            .insert_expense(
                &admin,
                NewExpense {
                    date: None,
                    description: "soap".to_string(),
                    amount: dec!(12.50),
                },
            )
            .await
            .unwrap();
        assert_eq!(exp.amount, dec!(12.50));

        let err = st.list_expenses(&customer).await.unwrap_err();
        assert!(matches!(err, StoreError::Authorization(_)));
        assert_eq!(st.list_expenses(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_hides_foreign_orders_from_customers() {
        let st = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let order = st
            .create_order(&Principal::customer(alice), new_order(alice, 1))
            .await
            .unwrap();

        let err = st
            .fetch_order(&Principal::customer(bob), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert!(st
            .fetch_order(&Principal::customer(alice), order.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn writes_publish_change_events() {
        let st = store();
        let mut rx = st.subscribe();
        let uid = Uuid::new_v4();
        let admin = Principal::admin(Uuid::new_v4());

        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.table, FeedTable::Orders);
        assert_eq!(ev.op, ChangeOp::Insert);
        assert_eq!(ev.id, order.id);
        assert_eq!(ev.owner_id, Some(uid));

        st.advance_order(&admin, order.id).await.unwrap();
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.op, ChangeOp::Update);

        st.insert_expense(
            &admin,
            NewExpense {
                date: None,
                description: "detergent".to_string(),
                amount: dec!(5.00),
            },
        )
        .await
        .unwrap();
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.table, FeedTable::Expenses);
        assert_eq!(ev.owner_id, None);
    }

    #[tokio::test]
    async fn terminal_noop_publishes_no_event() {
        let st = store();
        let uid = Uuid::new_v4();
        let admin = Principal::admin(Uuid::new_v4());
        let order = st
            .create_order(&Principal::customer(uid), new_order(uid, 1))
            .await
            .unwrap();
        for _ in 0..4 {
            st.advance_order(&admin, order.id).await.unwrap();
        }

        let mut rx = st.subscribe();
        st.advance_order(&admin, order.id).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
