//! Mapping of sqlx errors onto [`CoreError`].

use mailadmin_core::error::CoreError;

/// PostgreSQL unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Classify a sqlx error raised while working on `entity` identified by `key`.
///
/// - `RowNotFound` becomes [`CoreError::NotFound`].
/// - Unique violations become [`CoreError::Conflict`].
/// - Foreign key violations become [`CoreError::Validation`].
/// - Everything else is logged and becomes [`CoreError::Internal`].
pub fn classify(err: sqlx::Error, entity: &'static str, key: &str) -> CoreError {
    match &err {
        sqlx::Error::RowNotFound => CoreError::NotFound {
            entity,
            key: key.to_string(),
        },
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            CoreError::Conflict(format!("{entity} {key}"))
        }
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
        {
            let constraint = db_err.constraint().unwrap_or("unknown");
            CoreError::Validation(format!(
                "{entity} {key} references a missing record ({constraint})"
            ))
        }
        _ => internal(err),
    }
}

/// Infrastructure failure with no entity context.
pub fn internal(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("database error: {err}"))
}
