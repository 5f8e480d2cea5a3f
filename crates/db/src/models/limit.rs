//! Limit counter model.

use mailadmin_core::error::CoreError;
use mailadmin_core::limits::{Limit, ResourceKind};
use mailadmin_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_object_limits` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserObjectLimit {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub max_value: i32,
    pub current_value: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<UserObjectLimit> for Limit {
    type Error = CoreError;

    fn try_from(row: UserObjectLimit) -> Result<Self, Self::Error> {
        let resource = ResourceKind::from_str(&row.name).ok_or_else(|| {
            CoreError::Internal(format!("unknown limit name '{}' for user {}", row.name, row.user_id))
        })?;
        Ok(Limit {
            principal_id: row.user_id,
            resource,
            max_value: row.max_value,
            current_value: row.current_value,
        })
    }
}
