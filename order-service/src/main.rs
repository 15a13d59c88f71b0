use anyhow::Result;
use clap::{Parser, Subcommand};
use order_service::OrderService;
use serde::Serialize;
use shared::config::DatabaseArgs;
use shared::db::{self, PgStore};
use shared::{OrderStatus, SystemClock};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "order-service")]
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
    /// Open a new order in the initial status.
    Create {
        #[arg(long)]
        customer_id: Uuid,
        #[arg(long)]
        vehicle_id: Uuid,
    },
    /// Move an order to another status.
    Transition {
        order_id: Uuid,
        /// One of the known status names, e.g. "In progress".
        status: String,
    },
    /// Print the per-status durations of an order.
    Timeline { order_id: Uuid },
    /// Print an order with its line items, total and timeline.
    Overview { order_id: Uuid },
    /// List the accepted status names.
    Statuses,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    if let Command::Statuses = args.command {
        let names: Vec<&str> = OrderStatus::ALL.iter().map(OrderStatus::as_str).collect();
        return print_json(&names);
    }

    if !args.database.skip_migrations || matches!(args.command, Command::Migrate) {
        db::run_migrations(&args.database.database_url)?;
    }
    if let Command::Migrate = args.command {
        return Ok(());
    }

    let pool = db::connect(&args.database).await?;
    let service = OrderService::new(PgStore::new(pool), Arc::new(SystemClock));
    info!("Order service connected to database");

    match args.command {
        Command::Create {
            customer_id,
            vehicle_id,
        } => print_json(&service.create_order(customer_id, vehicle_id).await?),
        Command::Transition { order_id, status } => {
            print_json(&service.timeline().transition_status(order_id, &status).await?)
        }
        Command::Timeline { order_id } => {
            print_json(&service.timeline().compute_timeline(order_id).await)
        }
        Command::Overview { order_id } => print_json(&service.overview(order_id).await?),
        Command::Migrate | Command::Statuses => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
