//! Mailbox alias model and DTOs.

use mailadmin_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `aliases` table. Recipients live in `alias_recipients`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Alias {
    pub id: DbId,
    pub address: String,
    pub domain_id: DbId,
    pub enabled: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an alias together with its recipients.
#[derive(Debug, Clone)]
pub struct CreateAlias {
    pub address: String,
    pub domain_id: DbId,
    pub enabled: bool,
    pub created_by: Option<DbId>,
    pub recipients: Vec<String>,
}
