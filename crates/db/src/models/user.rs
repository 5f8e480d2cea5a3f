//! Account entity model and DTOs.

use mailadmin_core::roles::{Principal, Role};
use mailadmin_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Full row from the `users` table.
///
/// Contains the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// The account as a principal, `None` if the stored role is unknown.
    pub fn principal(&self) -> Option<Principal> {
        Role::from_str(&self.role).map(|role| Principal::new(self.id, role))
    }
}

/// DTO for creating an account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_by: Option<DbId>,
}
