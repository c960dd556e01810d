//! Scenario: row-level security scopes and NOTIFY change feed.
//!
//! A customer principal sees only their own orders and cannot move status;
//! an out-of-policy raw insert is rejected by RLS (SQLSTATE 42501); a
//! committed write is delivered to change-feed subscribers.
//!
//! DB-backed test. Skips (prints `SKIP:`) if `SUDS_DATABASE_URL` is not set
//! or unreachable.

use std::time::Duration;

use rust_decimal_macros::dec;
use sqlx::Connection;
use suds_db::{LaundryStore, OrderFilter, PgStore};
use suds_schemas::{ChangeOp, FeedTable, NewOrder, Principal};
use uuid::Uuid;

async fn store() -> anyhow::Result<Option<PgStore>> {
    let url = match std::env::var(suds_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: SUDS_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: cannot connect to DB: {e}");
            return Ok(None);
        }
    };
    suds_db::migrate(&pool).await?;
    Ok(Some(PgStore::new(pool, dec!(75.00))))
}

#[tokio::test]
async fn customer_reads_are_owner_scoped() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    store
        .create_order(
            &Principal::customer(alice),
            NewOrder {
                user_id: alice,
                client_name: "Alice".to_string(),
                load_count: 1,
                instructions: None,
            },
        )
        .await?;
    let bobs = store
        .create_order(
            &Principal::customer(bob),
            NewOrder {
                user_id: bob,
                client_name: "Bob".to_string(),
                load_count: 2,
                instructions: None,
            },
        )
        .await?;

    let mine = store
        .list_orders(&Principal::customer(alice), OrderFilter::default())
        .await?;
    assert!(mine.iter().all(|o| o.user_id == Some(alice)));
    assert!(!mine.is_empty());

    // Foreign fetch is hidden, not refused.
    let err = store
        .fetch_order(&Principal::customer(alice), bobs.id)
        .await
        .unwrap_err();
    assert!(matches!(err, suds_db::StoreError::NotFound(_)));

    // Customer advance is refused before any SQL runs.
    let err = store
        .advance_order(&Principal::customer(bob), bobs.id)
        .await
        .unwrap_err();
    assert!(matches!(err, suds_db::StoreError::Authorization(_)));

    Ok(())
}

#[tokio::test]
async fn rls_rejects_out_of_policy_raw_writes() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let pool = store.pool().clone();

    let alice = Uuid::new_v4();
    let mallory = Uuid::new_v4();
    sqlx::query("insert into users (id) values ($1), ($2) on conflict (id) do nothing")
        .bind(alice)
        .bind(mallory)
        .execute(&pool)
        .await?;

    // A raw insert naming someone else's account, pinned to a customer role,
    // violates the orders_insert policy.
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;
    sqlx::query(
        "select set_config('suds.user_id', $1, true), set_config('suds.role', 'customer', true)",
    )
    .bind(mallory.to_string())
    .execute(&mut *tx)
    .await?;
    let err = sqlx::query(
        r#"
        insert into orders (id, user_id, client_name, load_count, price)
        values ($1, $2, 'Forged', 1, 75.00)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(alice)
    .execute(&mut *tx)
    .await
    .unwrap_err();
    if let sqlx::Error::Database(db_err) = &err {
        assert_eq!(
            db_err.code().as_deref(),
            Some("42501"),
            "expected RLS rejection, got: {err}"
        );
    } else {
        panic!("expected database error, got: {err}");
    }
    tx.rollback().await?;

    // A connection with no pinned principal reads nothing.
    let mut tx = conn.begin().await?;
    let (n,): (i64,) = sqlx::query_as("select count(*)::bigint from orders")
        .fetch_one(&mut *tx)
        .await?;
    assert_eq!(n, 0, "unpinned connection must see zero order rows");
    tx.rollback().await?;

    Ok(())
}

#[tokio::test]
async fn committed_writes_reach_change_feed_subscribers() -> anyhow::Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let mut rx = store.subscribe();

    // Give the LISTEN task a moment to attach before writing.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let uid = Uuid::new_v4();
    let order = store
        .create_order(
            &Principal::customer(uid),
            NewOrder {
                user_id: uid,
                client_name: "Feed Test".to_string(),
                load_count: 1,
                instructions: None,
            },
        )
        .await?;

    let ev = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = rx.recv().await.expect("bus closed");
            if ev.id == order.id {
                return ev;
            }
        }
    })
    .await
    .expect("no change event within 5s");

    assert_eq!(ev.table, FeedTable::Orders);
    assert_eq!(ev.op, ChangeOp::Insert);
    assert_eq!(ev.owner_id, Some(uid));

    Ok(())
}
