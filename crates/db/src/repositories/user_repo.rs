//! Repository for the `users` and `domain_admins` tables.

use mailadmin_core::limits::ResourceKind;
use mailadmin_core::roles::Role;
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::user::{CreateUser, User};
use crate::repositories::LimitRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, first_name, last_name, role, \
    is_active, created_by, created_at, updated_at";

/// Provides CRUD operations for accounts and their domain grants.
pub struct UserRepo;

impl UserRepo {
    /// Insert an account in its own transaction.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let user = Self::insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Insert an account inside an open transaction.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateUser,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users \
                (username, password_hash, first_name, last_name, role, is_active, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.password_hash)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.role.as_str())
            .bind(input.is_active)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await
    }

    /// Find an account by username (stored lowercase).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username.to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Grant `user_id` admin rights over a domain. Granting twice is a no-op.
    pub async fn add_domain_admin(
        tx: &mut Transaction<'_, Postgres>,
        domain_id: DbId,
        user_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO domain_admins (domain_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (domain_id, user_id) DO NOTHING",
        )
        .bind(domain_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Whether `user_id` holds an explicit grant over the domain named `domain`.
    pub async fn administers_domain(
        pool: &PgPool,
        user_id: DbId,
        domain: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM domain_admins da \
                JOIN domains d ON d.id = da.domain_id \
                WHERE da.user_id = $1 AND d.name = $2 \
             )",
        )
        .bind(user_id)
        .bind(domain)
        .fetch_one(pool)
        .await
    }

    /// Delete an account and give its slot back to whoever created it.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("DELETE FROM users WHERE id = $1 RETURNING {COLUMNS}");
        let deleted = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = deleted else {
            return Ok(false);
        };

        let resource = match Role::from_str(&user.role) {
            Some(Role::SimpleUsers) => Some(ResourceKind::Mailboxes),
            Some(Role::DomainAdmins) => Some(ResourceKind::DomainAdmins),
            _ => None,
        };
        if let (Some(resource), Some(owner)) = (resource, user.created_by) {
            LimitRepo::release_by(&mut tx, owner, resource, 1).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
