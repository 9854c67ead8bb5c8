use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, Set};

use crate::AppState;
use crate::entities::{prelude::*, transactions};
use crate::models::ErrorResponse;
use crate::models::transaction::{
    ListTransactionsQuery, SubmitTransactionRequest, SubmitTransactionResponse,
};
use crate::services::blockfrost::BlockfrostError;
use crate::services::tx_status::TransactionStatus;

/// Submit a client-signed transaction to Blockfrost and record it for the
/// status sync job to reconcile.
pub async fn submit_transaction(
    State(state): State<AppState>,
    Json(req): Json<SubmitTransactionRequest>,
) -> Result<Json<SubmitTransactionResponse>, (StatusCode, Json<ErrorResponse>)> {
    if req.signed_tx_cbor.is_empty() {
        return Err(bad_request("signed_tx_cbor is required"));
    }
    if req.recipient_address.is_empty() {
        return Err(bad_request("recipient_address is required"));
    }
    if req.amount_lovelace <= 0 {
        return Err(bad_request("amount_lovelace must be greater than 0"));
    }
    if !state.blockfrost.has_project_id() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Blockfrost API key not configured")),
        ));
    }

    let tx_hash = state
        .blockfrost
        .submit_transaction(&req.signed_tx_cbor)
        .await
        .map_err(|e| {
            let status = match &e {
                BlockfrostError::InvalidPayload(_) | BlockfrostError::Api { .. } => {
                    StatusCode::BAD_REQUEST
                }
                BlockfrostError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            tracing::warn!("Transaction submit rejected: {}", e);
            (
                status,
                Json(ErrorResponse::with_code(
                    format!("Failed to submit transaction: {}", e),
                    e.error_code(),
                )),
            )
        })?;

    tracing::info!("Submitted transaction {} for user {}", tx_hash, req.user_id);

    let now = Utc::now().fixed_offset();
    let record = transactions::ActiveModel {
        user_id: Set(req.user_id),
        tx_hash: Set(Some(tx_hash.clone())),
        recipient_address: Set(req.recipient_address.clone()),
        amount_lovelace: Set(req.amount_lovelace),
        status: Set(TransactionStatus::Submitted.as_str().to_string()),
        created_at: Set(now),
        submitted_at: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
    };

    record.insert(state.db.as_ref()).await.map_err(|e| {
        tracing::error!("Failed to record submitted transaction {}: {}", tx_hash, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Database error: {}", e))),
        )
    })?;

    Ok(Json(SubmitTransactionResponse { tx_hash }))
}

/// List a user's transactions, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<transactions::Model>>, (StatusCode, Json<ErrorResponse>)> {
    let records = Transactions::find()
        .filter(transactions::Column::UserId.eq(query.user_id))
        .order_by(transactions::Column::CreatedAt, Order::Desc)
        .all(state.db.as_ref())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("Database error: {}", e))),
            )
        })?;

    Ok(Json(records))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<transactions::Model>, (StatusCode, Json<ErrorResponse>)> {
    let record = Transactions::find()
        .filter(transactions::Column::TxHash.eq(&tx_hash))
        .one(state.db.as_ref())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("Database error: {}", e))),
            )
        })?;

    match record {
        Some(record) => Ok(Json(record)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::with_code(
                format!("Transaction with hash {} not found", tx_hash),
                Some("TRANSACTION_NOT_FOUND".to_string()),
            )),
        )),
    }
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}
