//! Domain entity model and DTOs.

use mailadmin_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `domains` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Domain {
    pub id: DbId,
    pub name: String,
    pub quota_mb: i32,
    pub default_mailbox_quota_mb: Option<i32>,
    pub enabled: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a domain.
#[derive(Debug, Clone)]
pub struct CreateDomain {
    pub name: String,
    pub quota_mb: i32,
    pub default_mailbox_quota_mb: Option<i32>,
    pub enabled: bool,
    pub created_by: Option<DbId>,
}
