//! `suds order` subcommands.

use anyhow::Result;
use suds_db::{LaundryStore, OrderFilter};
use suds_schemas::{NewOrder, Order};
use uuid::Uuid;

use super::{open_store, operator, parse_uuid};

pub async fn create(
    client_name: String,
    loads: i32,
    instructions: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let store = open_store().await?;
    let owner = match user {
        Some(raw) => parse_uuid(&raw, "user")?,
        None => Uuid::nil(),
    };

    let order = store
        .create_order(
            &operator(),
            NewOrder {
                user_id: owner,
                client_name,
                load_count: loads,
                instructions,
            },
        )
        .await?;

    print_order(&order);
    Ok(())
}

pub async fn advance(order_id: &str) -> Result<()> {
    let store = open_store().await?;
    let id = parse_uuid(order_id, "order")?;
    let order = store.advance_order(&operator(), id).await?;
    println!("advanced=true order_id={} status={}", order.id, order.status);
    Ok(())
}

pub async fn show(order_id: &str) -> Result<()> {
    let store = open_store().await?;
    let id = parse_uuid(order_id, "order")?;
    let order = store.fetch_order(&operator(), id).await?;
    print_order(&order);
    Ok(())
}

pub async fn list(active: bool) -> Result<()> {
    let store = open_store().await?;
    let orders = store
        .list_orders(&operator(), OrderFilter { active_only: active })
        .await?;
    for o in &orders {
        println!(
            "{}  {:<18}  loads={} price={} client={}",
            o.id, o.status, o.load_count, o.price, o.client_name
        );
    }
    println!("count={}", orders.len());
    Ok(())
}

fn print_order(o: &Order) {
    println!("order_id={}", o.id);
    println!("client_name={}", o.client_name);
    println!("load_count={}", o.load_count);
    println!("price={}", o.price);
    println!("status={}", o.status);
    println!(
        "user_id={}",
        o.user_id.map(|u| u.to_string()).unwrap_or_default()
    );
    println!("created_at={}", o.created_at.to_rfc3339());
    println!("updated_at={}", o.updated_at.to_rfc3339());
}
