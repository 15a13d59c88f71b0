use anyhow::Result;
use clap::{Parser, Subcommand};
use inventory_service::InventoryReservation;
use serde::Serialize;
use shared::config::DatabaseArgs;
use shared::db::{self, PgStore};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "inventory-service")]
struct Args {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    /// Attach an input to an order, reserving stock for parts.
    Add {
        order_id: Uuid,
        input_id: Uuid,
        quantity: i32,
    },
    /// Detach an input from an order, returning stock for parts.
    Remove {
        order_id: Uuid,
        input_id: Uuid,
        quantity: i32,
    },
    /// Add units to an input's on-hand stock.
    Restock { input_id: Uuid, amount: i32 },
    /// Take units out of an input's on-hand stock.
    Withdraw { input_id: Uuid, amount: i32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    if !args.database.skip_migrations || matches!(args.command, Command::Migrate) {
        db::run_migrations(&args.database.database_url)?;
    }
    if let Command::Migrate = args.command {
        return Ok(());
    }

    let pool = db::connect(&args.database).await?;
    let reservation = InventoryReservation::new(PgStore::new(pool));
    info!("Inventory service connected to database");

    match args.command {
        Command::Migrate => Ok(()),
        Command::Add {
            order_id,
            input_id,
            quantity,
        } => print_json(&reservation.add_input(order_id, input_id, quantity).await?),
        Command::Remove {
            order_id,
            input_id,
            quantity,
        } => print_json(&reservation.remove_input(order_id, input_id, quantity).await?),
        Command::Restock { input_id, amount } => {
            print_json(&reservation.increase_quantity(input_id, amount).await?)
        }
        Command::Withdraw { input_id, amount } => {
            print_json(&reservation.decrease_quantity(input_id, amount).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
