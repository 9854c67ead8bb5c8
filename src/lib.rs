// src/lib.rs

use sea_orm::DatabaseConnection;
use services::blockfrost::BlockfrostService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub blockfrost: BlockfrostService,
}

pub mod entities {
    pub mod prelude;
    pub mod transactions;
}

pub mod services {
    pub mod blockfrost;
    pub mod circuit_breaker;
    pub mod resilience;
    pub mod tx_status;
}

pub mod jobs {
    pub mod transaction_status_sync;
}

pub mod models;
pub mod handlers;
