//! Repository for the `user_object_limits` table.
//!
//! Counter changes are single conditional statements, so concurrent
//! reservations for the same (user, name) pair serialize on the row lock.

use mailadmin_core::limits::ResourceKind;
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::limit::UserObjectLimit;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, name, max_value, current_value, created_at, updated_at";

/// Provides counter operations for per-account limits.
pub struct LimitRepo;

impl LimitRepo {
    /// Find one limit of a user.
    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        resource: ResourceKind,
    ) -> Result<Option<UserObjectLimit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_object_limits WHERE user_id = $1 AND name = $2");
        sqlx::query_as::<_, UserObjectLimit>(&query)
            .bind(user_id)
            .bind(resource.as_str())
            .fetch_optional(pool)
            .await
    }

    /// All limits of a user.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserObjectLimit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_object_limits WHERE user_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, UserObjectLimit>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Insert the given limits, leaving rows that already exist untouched.
    pub async fn create_defaults(
        pool: &PgPool,
        user_id: DbId,
        defaults: &[(ResourceKind, i32)],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for &(resource, max_value) in defaults {
            sqlx::query(
                "INSERT INTO user_object_limits (user_id, name, max_value) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, name) DO NOTHING",
            )
            .bind(user_id)
            .bind(resource.as_str())
            .bind(max_value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Increment the counter if there is headroom.
    ///
    /// Returns `None` when the limit is reached or does not exist; use
    /// [`LimitRepo::find`] to tell the two apart.
    pub async fn reserve(
        pool: &PgPool,
        user_id: DbId,
        resource: ResourceKind,
    ) -> Result<Option<UserObjectLimit>, sqlx::Error> {
        let query = format!(
            "UPDATE user_object_limits \
             SET current_value = current_value + 1, updated_at = NOW() \
             WHERE user_id = $1 AND name = $2 \
               AND (max_value = -1 OR current_value < max_value) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserObjectLimit>(&query)
            .bind(user_id)
            .bind(resource.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Decrement the counter, never below zero. `None` if the limit is missing.
    pub async fn release(
        pool: &PgPool,
        user_id: DbId,
        resource: ResourceKind,
    ) -> Result<Option<UserObjectLimit>, sqlx::Error> {
        let query = format!(
            "UPDATE user_object_limits \
             SET current_value = GREATEST(current_value - 1, 0), updated_at = NOW() \
             WHERE user_id = $1 AND name = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserObjectLimit>(&query)
            .bind(user_id)
            .bind(resource.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Decrement the counter by `count` inside an open transaction.
    ///
    /// Used when entities are deleted. A missing limit is not an error.
    pub async fn release_by(
        tx: &mut Transaction<'_, Postgres>,
        user_id: DbId,
        resource: ResourceKind,
        count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_object_limits \
             SET current_value = GREATEST(current_value - $3, 0), updated_at = NOW() \
             WHERE user_id = $1 AND name = $2",
        )
        .bind(user_id)
        .bind(resource.as_str())
        .bind(count)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Release one unit per owner, as returned by a `GROUP BY created_by` count.
    pub async fn release_owned(
        tx: &mut Transaction<'_, Postgres>,
        resource: ResourceKind,
        owners: &[(DbId, i32)],
    ) -> Result<(), sqlx::Error> {
        for &(user_id, count) in owners {
            Self::release_by(tx, user_id, resource, count).await?;
        }
        Ok(())
    }

    /// Change the maximum unless it would fall below the current counter.
    /// `None` if the limit is missing or the guard refused the update.
    pub async fn set_max(
        pool: &PgPool,
        user_id: DbId,
        resource: ResourceKind,
        max_value: i32,
    ) -> Result<Option<UserObjectLimit>, sqlx::Error> {
        let query = format!(
            "UPDATE user_object_limits \
             SET max_value = $3, updated_at = NOW() \
             WHERE user_id = $1 AND name = $2 \
               AND ($3 = -1 OR current_value <= $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserObjectLimit>(&query)
            .bind(user_id)
            .bind(resource.as_str())
            .bind(max_value)
            .fetch_optional(pool)
            .await
    }
}
