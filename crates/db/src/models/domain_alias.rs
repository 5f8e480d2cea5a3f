use mailadmin_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `domain_aliases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DomainAlias {
    pub id: DbId,
    pub name: String,
    pub target_id: DbId,
    pub enabled: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateDomainAlias {
    pub name: String,
    pub target_id: DbId,
    pub enabled: bool,
    pub created_by: Option<DbId>,
}
