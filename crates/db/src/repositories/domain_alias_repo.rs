//! Repository for the `domain_aliases` table.

use mailadmin_core::limits::ResourceKind;
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::domain_alias::{CreateDomainAlias, DomainAlias};
use crate::repositories::LimitRepo;

const COLUMNS: &str = "id, name, target_id, enabled, created_by, created_at, updated_at";

/// Provides CRUD operations for domain aliases.
pub struct DomainAliasRepo;

impl DomainAliasRepo {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateDomainAlias,
    ) -> Result<DomainAlias, sqlx::Error> {
        let query = format!(
            "INSERT INTO domain_aliases (name, target_id, enabled, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DomainAlias>(&query)
            .bind(&input.name)
            .bind(input.target_id)
            .bind(input.enabled)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<DomainAlias>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM domain_aliases WHERE name = $1");
        sqlx::query_as::<_, DomainAlias>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Delete a domain alias and release its creator's `domain_aliases` slot.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let creator = sqlx::query_scalar::<_, Option<DbId>>(
            "DELETE FROM domain_aliases WHERE id = $1 RETURNING created_by",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(creator) = creator else {
            return Ok(false);
        };
        if let Some(owner) = creator {
            LimitRepo::release_by(&mut tx, owner, ResourceKind::DomainAliases, 1).await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}
