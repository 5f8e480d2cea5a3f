//! Repository for the `mailboxes` table.

use sqlx::{PgPool, Postgres, Transaction};

use crate::models::mailbox::{CreateMailbox, Mailbox};

const COLUMNS: &str = "id, address, domain_id, user_id, quota_mb, created_by, created_at, updated_at";

/// Provides operations for mailboxes.
///
/// Mailboxes are removed together with their account; see
/// [`UserRepo::delete`](crate::repositories::UserRepo::delete).
pub struct MailboxRepo;

impl MailboxRepo {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateMailbox,
    ) -> Result<Mailbox, sqlx::Error> {
        let query = format!(
            "INSERT INTO mailboxes (address, domain_id, user_id, quota_mb, created_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Mailbox>(&query)
            .bind(&input.address)
            .bind(input.domain_id)
            .bind(input.user_id)
            .bind(input.quota_mb)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_address(
        pool: &PgPool,
        address: &str,
    ) -> Result<Option<Mailbox>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM mailboxes WHERE address = $1");
        sqlx::query_as::<_, Mailbox>(&query)
            .bind(address)
            .fetch_optional(pool)
            .await
    }

    /// Whether `address` is taken by a mailbox or an alias.
    pub async fn address_in_use(
        tx: &mut Transaction<'_, Postgres>,
        address: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM mailboxes WHERE address = $1) \
                 OR EXISTS (SELECT 1 FROM aliases WHERE address = $1)",
        )
        .bind(address)
        .fetch_one(&mut **tx)
        .await
    }
}
