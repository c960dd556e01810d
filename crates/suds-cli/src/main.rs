//! suds-cli: operator tooling for the laundry store.
//!
//! Every command here acts with the admin role against the database named by
//! `SUDS_DATABASE_URL`. Customer-facing access goes through suds-daemon; this
//! binary is for the shop operator and for deployment chores (migrations,
//! config hashing, status checks).

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "suds")]
#[command(about = "Laundry order tracking CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> site...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Order commands
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },

    /// Expense commands
    Expense {
        #[command(subcommand)]
        cmd: ExpenseCmd,
    },

    /// Print ledger totals derived from the current snapshot
    Ledger,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations. Guardrail: refuses while orders are mid-pipeline unless --yes is provided.
    Migrate {
        /// Acknowledge you are migrating a DB with live orders in it.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Create an order; the price is derived from the load count.
    Create {
        /// Name the order is filed under
        #[arg(long)]
        client_name: String,

        /// Number of loads (>= 1)
        #[arg(long)]
        loads: i32,

        /// Free-form handling instructions
        #[arg(long)]
        instructions: Option<String>,

        /// Owning account id; omitted = filed under the shop account
        #[arg(long)]
        user: Option<String>,
    },

    /// Move an order one stage down the pipeline.
    Advance {
        /// Order id
        #[arg(long)]
        order_id: String,
    },

    /// Print one order row
    Show {
        /// Order id
        #[arg(long)]
        order_id: String,
    },

    /// List orders, newest first
    List {
        /// Only orders still in the pipeline
        #[arg(long, default_value_t = false)]
        active: bool,
    },
}

#[derive(Subcommand)]
enum ExpenseCmd {
    /// Record an operating expense
    Add {
        #[arg(long)]
        description: String,

        /// Positive amount, e.g. 40.00
        #[arg(long)]
        amount: String,

        /// RFC 3339 occurrence time; omitted = now
        #[arg(long)]
        date: Option<String>,
    },

    /// List expenses, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => commands::db::status().await?,
            DbCmd::Migrate { yes } => commands::db::migrate(yes).await?,
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = suds_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Order { cmd } => match cmd {
            OrderCmd::Create {
                client_name,
                loads,
                instructions,
                user,
            } => commands::order::create(client_name, loads, instructions, user).await?,
            OrderCmd::Advance { order_id } => commands::order::advance(&order_id).await?,
            OrderCmd::Show { order_id } => commands::order::show(&order_id).await?,
            OrderCmd::List { active } => commands::order::list(active).await?,
        },

        Commands::Expense { cmd } => match cmd {
            ExpenseCmd::Add {
                description,
                amount,
                date,
            } => commands::expense::add(description, &amount, date.as_deref()).await?,
            ExpenseCmd::List => commands::expense::list().await?,
        },

        Commands::Ledger => commands::ledger::show().await?,
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
