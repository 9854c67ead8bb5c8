//! Blockfrost chain-indexing API client.
//!
//! Thin reqwest wrapper over the three endpoints the service consumes:
//! transaction lookup, address UTXOs, and transaction submission. Every
//! call is routed through the [`ResilientClient`] pipeline.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::resilience::{CallPolicy, ResilientClient};

#[derive(Debug, Error)]
pub enum BlockfrostError {
    /// The indexer has not seen the requested resource (HTTP 404).
    #[error("resource not found on Blockfrost")]
    NotFound,
    /// The circuit breaker is open; no network call was attempted.
    #[error("{service} is temporarily unavailable (circuit open)")]
    ServiceUnavailable { service: String },
    #[error("Blockfrost API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("network error calling Blockfrost: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl BlockfrostError {
    /// Transient failures worth retrying: network errors, rate limits,
    /// and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            BlockfrostError::Network(_) => true,
            BlockfrostError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Machine-readable code for structured error payloads.
    pub fn error_code(&self) -> Option<String> {
        match self {
            BlockfrostError::NotFound => Some("404".to_string()),
            BlockfrostError::ServiceUnavailable { .. } => Some("503".to_string()),
            BlockfrostError::Api { status, .. } => Some(status.to_string()),
            _ => None,
        }
    }
}

/// Subset of the Blockfrost `/txs/{hash}` response the service cares
/// about. `block_height` present means the transaction is in a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionContent {
    pub hash: String,
    #[serde(default)]
    pub block_height: Option<i64>,
    #[serde(default)]
    pub slot: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUtxo {
    pub tx_hash: String,
    pub amount: Vec<UtxoAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoAmount {
    pub unit: String,
    pub quantity: String,
}

/// The chain-lookup seam the status sync job depends on, so tests can
/// substitute a stub for the live API.
#[async_trait]
pub trait ChainLookup: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionContent, BlockfrostError>;
}

#[derive(Clone)]
pub struct BlockfrostService {
    client: Client,
    project_id: String,
    base_url: String,
    resilient: ResilientClient,
}

impl BlockfrostService {
    pub fn new(project_id: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            project_id,
            base_url,
            resilient: ResilientClient::new(Arc::new(CircuitBreaker::default())),
        }
    }

    pub fn has_project_id(&self) -> bool {
        !self.project_id.is_empty()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BlockfrostError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("project_id", &self.project_id)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BlockfrostError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BlockfrostError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlockfrostError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Look up a transaction by hash. 404 means the indexer has not seen
    /// it (yet); confirmation metadata appears once it is in a block.
    pub async fn transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionContent, BlockfrostError> {
        let policy = CallPolicy::lookup();
        let path = format!("/txs/{}", tx_hash);
        self.resilient
            .call(&policy, "transaction_by_hash", &[tx_hash], || {
                self.get_json(&path)
            })
            .await
    }

    pub async fn address_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, BlockfrostError> {
        let policy = CallPolicy::balance();
        let path = format!("/addresses/{}/utxos", address);
        self.resilient
            .call(&policy, "address_utxos", &[address], || self.get_json(&path))
            .await
    }

    /// Total lovelace held at an address, summed over its UTXOs. An
    /// address Blockfrost has never seen holds nothing.
    pub async fn lovelace_balance(&self, address: &str) -> Result<i64, BlockfrostError> {
        let utxos = match self.address_utxos(address).await {
            Ok(utxos) => utxos,
            Err(BlockfrostError::NotFound) => Vec::new(),
            Err(e) => return Err(e),
        };

        sum_lovelace(&utxos)
    }

    /// Submit a client-signed transaction (hex-encoded CBOR). Returns the
    /// transaction hash Blockfrost assigns on acceptance.
    pub async fn submit_transaction(
        &self,
        signed_tx_cbor_hex: &str,
    ) -> Result<String, BlockfrostError> {
        let bytes = hex::decode(signed_tx_cbor_hex)
            .map_err(|e| BlockfrostError::InvalidPayload(format!("invalid CBOR hex: {}", e)))?;

        let policy = CallPolicy::submit();
        let url = format!("{}/tx/submit", self.base_url);
        self.resilient
            .call(&policy, "submit_transaction", &[], || async {
                let response = self
                    .client
                    .post(&url)
                    .header("project_id", &self.project_id)
                    .header("Content-Type", "application/cbor")
                    .body(bytes.clone())
                    .send()
                    .await?;
                Self::decode::<String>(response).await
            })
            .await
    }
}

/// Sum the lovelace held across a set of UTXOs. A quantity the API
/// returns in a shape we cannot parse is an error, never a zero.
fn sum_lovelace(utxos: &[AddressUtxo]) -> Result<i64, BlockfrostError> {
    let mut total: i64 = 0;
    for utxo in utxos {
        for amount in &utxo.amount {
            if amount.unit == "lovelace" {
                let quantity = amount.quantity.parse::<i64>().map_err(|_| {
                    BlockfrostError::InvalidPayload(format!(
                        "malformed UTXO quantity '{}' in {}",
                        amount.quantity, utxo.tx_hash
                    ))
                })?;
                total += quantity;
            }
        }
    }
    Ok(total)
}

#[async_trait]
impl ChainLookup for BlockfrostService {
    fn is_configured(&self) -> bool {
        self.has_project_id()
    }

    async fn transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionContent, BlockfrostError> {
        BlockfrostService::transaction_by_hash(self, tx_hash).await
    }
}
