use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub lovelace: i64,
}
