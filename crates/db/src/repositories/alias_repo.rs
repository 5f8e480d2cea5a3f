//! Repository for the `aliases` and `alias_recipients` tables.

use mailadmin_core::limits::ResourceKind;
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::alias::{Alias, CreateAlias};
use crate::repositories::LimitRepo;

const COLUMNS: &str = "id, address, domain_id, enabled, created_by, created_at, updated_at";

/// Provides CRUD operations for mailbox aliases.
pub struct AliasRepo;

impl AliasRepo {
    /// Insert an alias and its recipients inside an open transaction.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateAlias,
    ) -> Result<Alias, sqlx::Error> {
        let query = format!(
            "INSERT INTO aliases (address, domain_id, enabled, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let alias = sqlx::query_as::<_, Alias>(&query)
            .bind(&input.address)
            .bind(input.domain_id)
            .bind(input.enabled)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await?;

        for recipient in &input.recipients {
            sqlx::query(
                "INSERT INTO alias_recipients (alias_id, address) VALUES ($1, $2) \
                 ON CONFLICT (alias_id, address) DO NOTHING",
            )
            .bind(alias.id)
            .bind(recipient)
            .execute(&mut **tx)
            .await?;
        }

        Ok(alias)
    }

    pub async fn find_by_address(
        pool: &PgPool,
        address: &str,
    ) -> Result<Option<Alias>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM aliases WHERE address = $1");
        sqlx::query_as::<_, Alias>(&query)
            .bind(address)
            .fetch_optional(pool)
            .await
    }

    /// Recipients of an alias, alphabetically.
    pub async fn recipients(pool: &PgPool, alias_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT address FROM alias_recipients WHERE alias_id = $1 ORDER BY address ASC",
        )
        .bind(alias_id)
        .fetch_all(pool)
        .await
    }

    /// Delete an alias and release its creator's `mailbox_aliases` slot.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let creator = sqlx::query_scalar::<_, Option<DbId>>(
            "DELETE FROM aliases WHERE id = $1 RETURNING created_by",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(creator) = creator else {
            return Ok(false);
        };
        if let Some(owner) = creator {
            LimitRepo::release_by(&mut tx, owner, ResourceKind::MailboxAliases, 1).await?;
        }
        tx.commit().await?;
        Ok(true)
    }
}
