//! Repository for the `domains` table.

use mailadmin_core::limits::ResourceKind;
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::domain::{CreateDomain, Domain};
use crate::repositories::LimitRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, quota_mb, default_mailbox_quota_mb, enabled, \
    created_by, created_at, updated_at";

/// Provides CRUD operations for domains.
pub struct DomainRepo;

impl DomainRepo {
    /// Insert a domain inside an open transaction.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateDomain,
    ) -> Result<Domain, sqlx::Error> {
        let query = format!(
            "INSERT INTO domains \
                (name, quota_mb, default_mailbox_quota_mb, enabled, created_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Domain>(&query)
            .bind(&input.name)
            .bind(input.quota_mb)
            .bind(input.default_mailbox_quota_mb)
            .bind(input.enabled)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Domain>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM domains WHERE name = $1");
        sqlx::query_as::<_, Domain>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Resolve a domain name to its ID inside an open transaction.
    pub async fn find_id(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM domains WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Whether `name` is a local domain or domain alias.
    pub async fn is_local(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM domains WHERE name = $1) \
                 OR EXISTS (SELECT 1 FROM domain_aliases WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
    }

    /// Delete a domain with everything in it, releasing each owner's limits
    /// in the same transaction.
    ///
    /// Simple-user accounts whose mailbox lives in the domain are deleted
    /// too. Returns `true` if the domain existed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let creator = sqlx::query_scalar::<_, Option<DbId>>(
            "SELECT created_by FROM domains WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(creator) = creator else {
            return Ok(false);
        };

        let domain_alias_owners = sqlx::query_as::<_, (DbId, i32)>(
            "SELECT created_by, COUNT(*)::INT FROM domain_aliases \
             WHERE target_id = $1 AND created_by IS NOT NULL GROUP BY created_by",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        LimitRepo::release_owned(&mut tx, ResourceKind::DomainAliases, &domain_alias_owners)
            .await?;

        let alias_owners = sqlx::query_as::<_, (DbId, i32)>(
            "SELECT created_by, COUNT(*)::INT FROM aliases \
             WHERE domain_id = $1 AND created_by IS NOT NULL GROUP BY created_by",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        LimitRepo::release_owned(&mut tx, ResourceKind::MailboxAliases, &alias_owners).await?;

        let mailbox_owners = sqlx::query_as::<_, (DbId, i32)>(
            "SELECT u.created_by, COUNT(*)::INT FROM users u \
             JOIN mailboxes m ON m.user_id = u.id \
             WHERE m.domain_id = $1 AND u.role = 'SimpleUsers' AND u.created_by IS NOT NULL \
             GROUP BY u.created_by",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        LimitRepo::release_owned(&mut tx, ResourceKind::Mailboxes, &mailbox_owners).await?;

        sqlx::query(
            "DELETE FROM users WHERE role = 'SimpleUsers' \
             AND id IN (SELECT user_id FROM mailboxes WHERE domain_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(owner) = creator {
            LimitRepo::release_by(&mut tx, owner, ResourceKind::Domains, 1).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
