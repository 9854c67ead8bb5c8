//! Background job that reconciles locally recorded transaction statuses
//! against the ledger as Blockfrost sees it.
//!
//! Runs periodically (in-process interval or the `update_transaction_status`
//! binary driven by cron). Re-running against unchanged remote state is a
//! no-op: the classifier is deterministic and the job only writes on change.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{Duration, interval};

use crate::entities::{prelude::*, transactions};
use crate::services::blockfrost::{BlockfrostError, ChainLookup};
use crate::services::tx_status::{TransactionStatus, classify_lookup};

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub processed: u64,
    pub updated: u64,
    pub errors: u64,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Blockfrost project id is not configured")]
    MissingCredentials,
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub async fn start_transaction_status_sync_job(
    db: Arc<DatabaseConnection>,
    chain: Arc<dyn ChainLookup>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            tracing::info!("Starting scheduled transaction status sync");

            match update_transaction_statuses(db.as_ref(), chain.as_ref(), 100, false).await {
                Ok(summary) => {
                    tracing::info!(
                        "Transaction status sync complete: processed {}, updated {}, errors {}",
                        summary.processed,
                        summary.updated,
                        summary.errors
                    );
                }
                Err(e) => tracing::error!("Transaction status sync failed: {}", e),
            }
        }
    });
}

/// Reconcile up to `limit` non-terminal transactions, oldest first.
///
/// Each record is looked up through the resilient Blockfrost pipeline and
/// reclassified; only forward transitions are persisted. A failure on one
/// record is counted and logged but never aborts the rest of the batch.
/// With `dry_run` set, lookups and classification still happen but nothing
/// is written; the summary counts the updates that would have applied.
pub async fn update_transaction_statuses(
    db: &DatabaseConnection,
    chain: &dyn ChainLookup,
    limit: u64,
    dry_run: bool,
) -> Result<SyncSummary, SyncError> {
    if !chain.is_configured() {
        return Err(SyncError::MissingCredentials);
    }

    let records = Transactions::find()
        .filter(transactions::Column::Status.is_in([
            TransactionStatus::Pending.as_str(),
            TransactionStatus::Submitted.as_str(),
        ]))
        .order_by(transactions::Column::CreatedAt, Order::Asc)
        .limit(limit)
        .all(db)
        .await?;

    if records.is_empty() {
        tracing::info!("No transactions need status updates");
        return Ok(SyncSummary::default());
    }

    tracing::info!("Processing {} transactions", records.len());
    let mut summary = SyncSummary::default();

    for record in records {
        summary.processed += 1;
        let record_id = record.id;

        let Some(current) = TransactionStatus::parse(&record.status) else {
            tracing::error!(
                "Transaction {} has unknown status '{}', skipping",
                record_id,
                record.status
            );
            summary.errors += 1;
            continue;
        };

        // No hash yet means there is nothing to look up; the record stays
        // pending until the submit flow assigns one.
        let Some(tx_hash) = record.tx_hash.clone() else {
            continue;
        };

        let lookup = chain.transaction_by_hash(&tx_hash).await;

        // An open circuit says the dependency is down, not that this
        // transaction failed. Count it and move on.
        if let Err(BlockfrostError::ServiceUnavailable { .. }) = &lookup {
            tracing::error!(
                "Error processing transaction {}: Blockfrost circuit is open",
                tx_hash
            );
            summary.errors += 1;
            continue;
        }

        let classification = classify_lookup(lookup);

        if !classification.status.advances_from(current) {
            if classification.status != current {
                tracing::warn!(
                    "Ignoring backward transition {} -> {} for {}",
                    current,
                    classification.status,
                    tx_hash
                );
            }
            continue;
        }

        if dry_run {
            tracing::info!(
                "Would update transaction {}: {} -> {}",
                tx_hash,
                current,
                classification.status
            );
            summary.updated += 1;
            continue;
        }

        tracing::info!(
            "Updated transaction {}: {} -> {}",
            tx_hash,
            current,
            classification.status
        );

        let now = Utc::now().fixed_offset();
        let mut active = record.into_active_model();
        active.status = Set(classification.status.as_str().to_string());
        active.updated_at = Set(now);
        match classification.status {
            TransactionStatus::Confirmed => {
                active.confirmed_at = Set(Some(now));
                active.block_height = Set(classification.block_height);
                active.slot = Set(classification.slot);
            }
            TransactionStatus::Failed => {
                active.error_message = Set(classification.error_message.clone());
                active.error_code = Set(classification.error_code.clone());
            }
            _ => {}
        }

        match active.update(db).await {
            Ok(_) => summary.updated += 1,
            Err(e) => {
                tracing::error!("Error persisting status for transaction {}: {}", tx_hash, e);
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        "Transaction status update complete: processed {}, updated {}, errors {}",
        summary.processed,
        summary.updated,
        summary.errors
    );

    Ok(summary)
}
