use mailadmin_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `mailboxes` table. One mailbox per account.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Mailbox {
    pub id: DbId,
    pub address: String,
    pub domain_id: DbId,
    pub user_id: DbId,
    pub quota_mb: Option<i32>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateMailbox {
    pub address: String,
    pub domain_id: DbId,
    pub user_id: DbId,
    pub quota_mb: Option<i32>,
    pub created_by: Option<DbId>,
}
