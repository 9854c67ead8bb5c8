use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardano_txwatch::services::blockfrost::BlockfrostService;
use cardano_txwatch::{AppState, handlers, jobs};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cardano_txwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    let db = Arc::new(db);

    // Blockfrost client (Preview testnet by default)
    let project_id = env::var("BLOCKFROST_PROJECT_ID").unwrap_or_default();
    if project_id.is_empty() {
        tracing::warn!("BLOCKFROST_PROJECT_ID is not set; chain calls will fail");
    }
    let base_url = env::var("BLOCKFROST_BASE_URL")
        .unwrap_or_else(|_| "https://cardano-preview.blockfrost.io/api/v0".to_string());
    let blockfrost = BlockfrostService::new(project_id, base_url);

    // Periodic transaction status reconciliation
    let sync_interval = env::var("STATUS_SYNC_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300);
    jobs::transaction_status_sync::start_transaction_status_sync_job(
        db.clone(),
        Arc::new(blockfrost.clone()),
        sync_interval,
    )
    .await;

    let state = AppState { db, blockfrost };

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route(
            "/api/transactions/submit",
            post(handlers::transactions::submit_transaction),
        )
        .route(
            "/api/transactions",
            get(handlers::transactions::list_transactions),
        )
        .route(
            "/api/transactions/{tx_hash}",
            get(handlers::transactions::get_transaction),
        )
        .route("/api/wallet/balance", get(handlers::wallet::get_balance))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "cardano-txwatch backend is running"
}
