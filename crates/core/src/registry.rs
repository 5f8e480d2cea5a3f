//! The limit registry contract and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::LimitDefaults;
use crate::error::CoreError;
use crate::limits::{templates_for, validate_max_value, Limit, Reservation, ResourceKind};
use crate::roles::Role;
use crate::types::DbId;

/// Tracks max/current counters per (principal, resource kind).
///
/// Implementations must serialize `reserve` and `release` per pair so that
/// concurrent callers never push a counter past its maximum.
#[async_trait]
pub trait LimitRegistry: Send + Sync {
    /// Fetch a limit. Fails with [`CoreError::NotFound`] when not configured.
    async fn get(&self, principal_id: DbId, resource: ResourceKind) -> Result<Limit, CoreError>;

    /// All limits of a principal, ordered by resource kind.
    async fn list(&self, principal_id: DbId) -> Result<Vec<Limit>, CoreError>;

    /// Atomically check the limit and increment it when there is headroom.
    async fn reserve(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<Reservation, CoreError>;

    /// Decrement the counter, never below zero.
    async fn release(&self, principal_id: DbId, resource: ResourceKind)
        -> Result<Limit, CoreError>;

    /// Create the limit records a new principal inherits from `defaults`.
    ///
    /// Existing records are left untouched.
    async fn provision(
        &self,
        principal_id: DbId,
        role: Role,
        defaults: &LimitDefaults,
    ) -> Result<Vec<Limit>, CoreError>;

    /// Change the maximum of an existing limit.
    async fn set_max(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
        max_value: i32,
    ) -> Result<Limit, CoreError>;

    async fn is_exceeded(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<bool, CoreError> {
        Ok(self.get(principal_id, resource).await?.is_exceeded())
    }
}

type LimitKey = (DbId, ResourceKind);

/// Registry keeping every limit in one mutex-guarded table.
#[derive(Debug, Default)]
pub struct MemoryLimitRegistry {
    limits: Mutex<HashMap<LimitKey, Limit>>,
}

impl MemoryLimitRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LimitRegistry for MemoryLimitRegistry {
    async fn get(&self, principal_id: DbId, resource: ResourceKind) -> Result<Limit, CoreError> {
        self.limits
            .lock()
            .await
            .get(&(principal_id, resource))
            .copied()
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))
    }

    async fn list(&self, principal_id: DbId) -> Result<Vec<Limit>, CoreError> {
        let limits = self.limits.lock().await;
        let mut owned: Vec<Limit> = limits
            .values()
            .filter(|limit| limit.principal_id == principal_id)
            .copied()
            .collect();
        owned.sort_by_key(|limit| limit.resource);
        Ok(owned)
    }

    async fn reserve(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<Reservation, CoreError> {
        let mut limits = self.limits.lock().await;
        let limit = limits
            .get_mut(&(principal_id, resource))
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?;
        if limit.is_exceeded() {
            return Ok(Reservation::Denied(*limit));
        }
        limit.current_value += 1;
        Ok(Reservation::Reserved(*limit))
    }

    async fn release(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
    ) -> Result<Limit, CoreError> {
        let mut limits = self.limits.lock().await;
        let limit = limits
            .get_mut(&(principal_id, resource))
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?;
        limit.current_value = (limit.current_value - 1).max(0);
        Ok(*limit)
    }

    async fn provision(
        &self,
        principal_id: DbId,
        role: Role,
        defaults: &LimitDefaults,
    ) -> Result<Vec<Limit>, CoreError> {
        let mut limits = self.limits.lock().await;
        let provisioned: Vec<Limit> = templates_for(role)
            .into_iter()
            .map(|kind| {
                *limits
                    .entry((principal_id, kind))
                    .or_insert_with(|| Limit::new(principal_id, kind, defaults.get(kind)))
            })
            .collect();
        Ok(provisioned)
    }

    async fn set_max(
        &self,
        principal_id: DbId,
        resource: ResourceKind,
        max_value: i32,
    ) -> Result<Limit, CoreError> {
        validate_max_value(max_value).map_err(CoreError::Validation)?;
        let mut limits = self.limits.lock().await;
        let limit = limits
            .get_mut(&(principal_id, resource))
            .ok_or_else(|| CoreError::limit_not_found(principal_id, resource.as_str()))?;
        limit.check_new_max(max_value).map_err(CoreError::Validation)?;
        limit.max_value = max_value;
        Ok(*limit)
    }
}
