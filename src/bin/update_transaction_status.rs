// src/bin/update_transaction_status.rs
//
// One-shot transaction status reconciliation, meant to be driven by cron:
//
//     cargo run --bin update_transaction_status -- --dry-run
//     cargo run --bin update_transaction_status -- --limit=50

use sea_orm::Database;
use std::env;

use cardano_txwatch::jobs::transaction_status_sync::update_transaction_statuses;
use cardano_txwatch::services::blockfrost::BlockfrostService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut dry_run = false;
    let mut limit: u64 = 100;
    for arg in env::args().skip(1) {
        if arg == "--dry-run" {
            dry_run = true;
        } else if let Some(value) = arg.strip_prefix("--limit=") {
            limit = value.parse()?;
        } else {
            eprintln!("Usage: update_transaction_status [--dry-run] [--limit=N]");
            std::process::exit(1);
        }
    }

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::connect(&database_url).await?;

    let project_id = env::var("BLOCKFROST_PROJECT_ID").unwrap_or_default();
    let base_url = env::var("BLOCKFROST_BASE_URL")
        .unwrap_or_else(|_| "https://cardano-preview.blockfrost.io/api/v0".to_string());
    let blockfrost = BlockfrostService::new(project_id, base_url);

    if dry_run {
        println!("DRY RUN MODE - no changes will be written to the database");
    }

    let summary = update_transaction_statuses(&db, &blockfrost, limit, dry_run).await?;

    if dry_run {
        println!(
            "Dry run complete. Would update {} of {} transactions ({} errors)",
            summary.updated, summary.processed, summary.errors
        );
    } else {
        println!(
            "Processed {} transactions: {} updated, {} errors",
            summary.processed, summary.updated, summary.errors
        );
    }

    Ok(())
}
