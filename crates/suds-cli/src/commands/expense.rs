//! `suds expense` subcommands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use suds_db::LaundryStore;
use suds_schemas::NewExpense;

use super::{open_store, operator, parse_money};

pub async fn add(description: String, amount: &str, date: Option<&str>) -> Result<()> {
    let store = open_store().await?;
    let amount = parse_money(amount)?;
    let date = match date {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw.trim())
                .context("--date must be RFC 3339")?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let expense = store
        .insert_expense(
            &operator(),
            NewExpense {
                date,
                description,
                amount,
            },
        )
        .await?;

    println!("expense_id={}", expense.id);
    println!("description={}", expense.description);
    println!("amount={}", expense.amount);
    println!("date={}", expense.date.to_rfc3339());
    Ok(())
}

pub async fn list() -> Result<()> {
    let store = open_store().await?;
    let expenses = store.list_expenses(&operator()).await?;
    for e in &expenses {
        println!(
            "{}  {}  amount={} {}",
            e.id,
            e.date.to_rfc3339(),
            e.amount,
            e.description
        );
    }
    println!("count={}", expenses.len());
    Ok(())
}
