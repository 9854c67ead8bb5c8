use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::AppState;
use crate::models::ErrorResponse;
use crate::models::wallet::{BalanceQuery, BalanceResponse};
use crate::services::blockfrost::BlockfrostError;

/// Current lovelace balance of an address, aggregated over its UTXOs.
/// Served through the short-lived balance cache.
pub async fn get_balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<ErrorResponse>)> {
    if query.address.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("address is required")),
        ));
    }

    let lovelace = state
        .blockfrost
        .lovelace_balance(&query.address)
        .await
        .map_err(|e| {
            let status = match &e {
                BlockfrostError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(ErrorResponse::with_code(
                    format!("Failed to fetch balance: {}", e),
                    e.error_code(),
                )),
            )
        })?;

    Ok(Json(BalanceResponse {
        address: query.address,
        lovelace,
    }))
}
