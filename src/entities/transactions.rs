//! SeaORM entity for the transactions table.
//!
//! Records are created by the submit flow in `submitted` state (or `pending`
//! before a hash is known) and mutated only by the status sync job until they
//! reach a terminal state.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i64,
    pub tx_hash: Option<String>,
    pub recipient_address: String,
    pub amount_lovelace: i64,
    pub status: String,
    pub block_height: Option<i64>,
    pub slot: Option<i64>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub submitted_at: Option<DateTimeWithTimeZone>,
    pub confirmed_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
