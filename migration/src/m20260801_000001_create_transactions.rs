//! Migration to create the transactions table for tracking wallet transfers
//! submitted through Blockfrost.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(pk_auto(Transactions::Id))
                    .col(big_integer(Transactions::UserId).not_null())
                    .col(string_null(Transactions::TxHash))
                    .col(string(Transactions::RecipientAddress).not_null())
                    .col(big_integer(Transactions::AmountLovelace).not_null())
                    .col(string(Transactions::Status).not_null())
                    .col(big_integer_null(Transactions::BlockHeight))
                    .col(big_integer_null(Transactions::Slot))
                    .col(text_null(Transactions::ErrorMessage))
                    .col(string_null(Transactions::ErrorCode))
                    .col(
                        timestamp_with_time_zone(Transactions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Transactions::SubmittedAt))
                    .col(timestamp_with_time_zone_null(Transactions::ConfirmedAt))
                    .col(
                        timestamp_with_time_zone(Transactions::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the status poller (non-terminal records, oldest first)
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_status_created_at")
                    .table(Transactions::Table)
                    .col(Transactions::Status)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index for querying a user's transaction history
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_id")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .to_owned(),
            )
            .await?;

        // A hash, once assigned by the chain, is unique (NULLs excluded)
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_tx_hash")
                    .table(Transactions::Table)
                    .col(Transactions::TxHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    TxHash,
    RecipientAddress,
    AmountLovelace,
    Status,
    BlockHeight,
    Slot,
    ErrorMessage,
    ErrorCode,
    CreatedAt,
    SubmittedAt,
    ConfirmedAt,
    UpdatedAt,
}
