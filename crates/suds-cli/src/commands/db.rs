//! `suds db` subcommands: status and guarded migrations.

use anyhow::Result;

pub async fn status() -> Result<()> {
    let pool = suds_db::connect_from_env().await?;
    let s = suds_db::status(&pool).await?;
    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
    Ok(())
}

/// Apply migrations. Refuses while orders are still mid-pipeline unless the
/// operator acknowledges with `--yes`.
pub async fn migrate(yes: bool) -> Result<()> {
    let pool = suds_db::connect_from_env().await?;

    let n = suds_db::count_active_orders(&pool).await?;
    if n > 0 && !yes {
        anyhow::bail!(
            "REFUSING MIGRATE: {} order(s) are still mid-pipeline. Re-run with: `suds db migrate --yes`",
            n
        );
    }

    suds_db::migrate(&pool).await?;
    println!("migrations_applied=true");
    Ok(())
}
