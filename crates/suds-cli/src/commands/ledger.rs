//! `suds ledger`: derived figures over the current snapshot.

use anyhow::Result;
use suds_db::{LaundryStore, OrderFilter};

use super::{open_store, operator};

pub async fn show() -> Result<()> {
    let store = open_store().await?;
    let p = operator();

    let orders = store.list_orders(&p, OrderFilter::default()).await?;
    let expenses = store.list_expenses(&p).await?;
    let totals = suds_ledger::aggregate(&orders, &expenses);

    println!("total_revenue={}", totals.total_revenue);
    println!("total_expenses={}", totals.total_expenses);
    println!("net_profit={}", totals.net_profit);
    println!("active_orders={}", totals.active_orders);
    Ok(())
}
