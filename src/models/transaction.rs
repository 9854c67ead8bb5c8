use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionRequest {
    /// Hex-encoded CBOR of the client-signed transaction.
    pub signed_tx_cbor: String,
    pub user_id: i64,
    pub recipient_address: String,
    pub amount_lovelace: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionResponse {
    pub tx_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTransactionsQuery {
    pub user_id: i64,
}
