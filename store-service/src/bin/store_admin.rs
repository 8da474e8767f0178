use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use store_service::store::{Maintenance, PgStore};

#[derive(Parser, Debug)]
#[command(about = "Store maintenance tasks", long_about = None)]
struct Options {
    /// Postgres connection string
    #[arg(long = "database-url", env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant the admin role to an existing account
    Promote {
        #[arg(long)]
        email: String,
    },
    /// Permanently remove rows soft-deleted before the cutoff
    PurgeDeleted {
        #[arg(long = "older-than-days", default_value_t = 30)]
        older_than_days: i64,

        /// Report counts without deleting anything
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let opts = Options::parse();

    let store = PgStore::connect(&opts.database_url, 2)
        .await
        .context("Failed to connect to database")?;

    match opts.command {
        Command::Promote { email } => {
            let email = email.trim().to_lowercase();
            if !store.promote_to_admin(&email).await? {
                bail!("no active account for {email}");
            }
            println!("{email} is now an admin");
        }
        Command::PurgeDeleted { older_than_days, dry_run } => {
            if older_than_days < 0 {
                bail!("--older-than-days must not be negative");
            }
            let cutoff = Utc::now() - Duration::days(older_than_days);
            let report = store.purge_deleted(cutoff, dry_run).await?;
            let verb = if dry_run { "would purge" } else { "purged" };
            println!(
                "{verb}: {} cart items, {} products, {} carts, {} users (deleted before {cutoff})",
                report.cart_items, report.products, report.carts, report.users
            );
        }
    }
    Ok(())
}
