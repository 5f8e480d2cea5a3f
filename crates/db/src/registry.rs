//! Postgres-backed [`LimitRegistry`].

use async_trait::async_trait;
use mailadmin_core::config::LimitDefaults;
use mailadmin_core::error::CoreError;
use mailadmin_core::limits::{templates_for, validate_max_value, Limit, Reservation, ResourceKind};
use mailadmin_core::registry::LimitRegistry;
use mailadmin_core::roles::Role;
use mailadmin_core::types::DbId;
use sqlx::PgPool;

use crate::error::internal;
use crate::repositories::LimitRepo;

/// Limit registry over the `user_object_limits` table.
#[derive(Debug, Clone)]
pub struct PgLimitRegistry {
    pool: PgPool,
}

impl PgLimitRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LimitRegistry for PgLimitRegistry {
    async fn get(&self, principal_id: DbId, resource: ResourceKind) -> Result<Limit, CoreError> {
        LimitRepo::find(&self.pool, principal_id, resource)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?
            .try_into()
    }

    async fn list(&self, principal_id: DbId) -> Result<Vec<Limit>, CoreError> {
        let rows = LimitRepo::list_for_user(&self.pool, principal_id)
            .await
            .map_err(internal)?;
        let mut limits = rows
            .into_iter()
            .map(Limit::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        limits.sort_by_key(|limit| limit.resource);
        Ok(limits)
    }

    async fn reserve(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<Reservation, CoreError> {
        match LimitRepo::reserve(&self.pool, principal_id, resource)
            .await
            .map_err(internal)?
        {
            Some(row) => Ok(Reservation::Reserved(row.try_into()?)),
            // Either exhausted or missing; `get` reports the latter.
            None => Ok(Reservation::Denied(self.get(principal_id, resource).await?)),
        }
    }

    async fn release(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<Limit, CoreError> {
        LimitRepo::release(&self.pool, principal_id, resource)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?
            .try_into()
    }

    async fn provision(
        &self,
        principal_id: DbId,
        role: Role,
        defaults: &LimitDefaults,
    ) -> Result<Vec<Limit>, CoreError> {
        let kinds = templates_for(role);
        let values: Vec<(ResourceKind, i32)> =
            kinds.iter().map(|&kind| (kind, defaults.get(kind))).collect();
        LimitRepo::create_defaults(&self.pool, principal_id, &values)
            .await
            .map_err(internal)?;

        let limits = self.list(principal_id).await?;
        tracing::debug!(principal_id, role = %role, count = kinds.len(), "Limits provisioned");
        Ok(limits
            .into_iter()
            .filter(|limit| kinds.contains(&limit.resource))
            .collect())
    }

    async fn set_max(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
        max_value: i32,
    ) -> Result<Limit, CoreError> {
        validate_max_value(max_value).map_err(CoreError::Validation)?;
        if let Some(row) = LimitRepo::set_max(&self.pool, principal_id, resource, max_value)
            .await
            .map_err(internal)?
        {
            return row.try_into();
        }

        // Nothing updated: either the limit is missing or it is in use above
        // the requested maximum.
        let current: Limit = LimitRepo::find(&self.pool, principal_id, resource)
            .await
            .map_err(internal)?
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?
            .try_into()?;
        current.check_new_max(max_value).map_err(CoreError::Validation)?;
        Err(CoreError::Internal(format!(
            "Limit {resource} of user {principal_id} changed concurrently"
        )))
    }
}
