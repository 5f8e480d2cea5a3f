use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing limit record of a principal.
    pub fn limit_not_found(principal_id: DbId, resource: &str) -> Self {
        Self::NotFound {
            entity: "Limit",
            key: format!("{resource} of principal {principal_id}"),
        }
    }
}
