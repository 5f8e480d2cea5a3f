//! Resource kinds, limit records and the pure limit arithmetic.
//!
//! No storage here. Registries (in-memory or Postgres) own the records and
//! call into these helpers to decide.

use serde::{Deserialize, Serialize};

use crate::roles::Role;
use crate::types::DbId;

/// Sentinel maximum meaning "no cap".
pub const UNLIMITED: i32 = -1;

/// A countable kind of object a principal may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Domains,
    DomainAliases,
    DomainAdmins,
    Mailboxes,
    MailboxAliases,
}

impl ResourceKind {
    /// Every kind, in the order templates are listed.
    pub const ALL: [ResourceKind; 5] = [
        Self::Domains,
        Self::DomainAliases,
        Self::DomainAdmins,
        Self::Mailboxes,
        Self::MailboxAliases,
    ];

    /// Name stored in the `user_object_limits.name` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domains => "domains",
            Self::DomainAliases => "domain_aliases",
            Self::DomainAdmins => "domain_admins",
            Self::Mailboxes => "mailboxes",
            Self::MailboxAliases => "mailbox_aliases",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Human-readable label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Domains => "Domains",
            Self::DomainAliases => "Domain aliases",
            Self::DomainAdmins => "Domain admins",
            Self::Mailboxes => "Mailboxes",
            Self::MailboxAliases => "Mailbox aliases",
        }
    }

    /// Lowest role that receives a limit of this kind.
    pub fn required_role(&self) -> Role {
        match self {
            Self::Domains | Self::DomainAliases | Self::DomainAdmins => Role::Resellers,
            Self::Mailboxes | Self::MailboxAliases => Role::DomainAdmins,
        }
    }

    /// Name of the configuration parameter holding the default maximum.
    pub fn default_parameter(&self) -> String {
        format!("DEFLT_USER_{}_LIMIT", self.as_str().to_uppercase())
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit kinds a principal with `role` inherits when it is created.
///
/// Super admins are never limited and get none.
pub fn templates_for(role: Role) -> Vec<ResourceKind> {
    if !role.is_limited() {
        return Vec::new();
    }
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| role >= kind.required_role())
        .collect()
}

/// One max/current counter pair owned by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub principal_id: DbId,
    pub resource: ResourceKind,
    pub max_value: i32,
    pub current_value: i32,
}

impl Limit {
    pub fn new(principal_id: DbId, resource: ResourceKind, max_value: i32) -> Self {
        Self {
            principal_id,
            resource,
            max_value,
            current_value: 0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_value == UNLIMITED
    }

    /// `true` once the counter has reached the maximum.
    pub fn is_exceeded(&self) -> bool {
        !self.is_unlimited() && self.current_value >= self.max_value
    }

    /// Remaining headroom, or `None` when unlimited.
    pub fn remaining(&self) -> Option<i32> {
        if self.is_unlimited() {
            None
        } else {
            Some((self.max_value - self.current_value).max(0))
        }
    }

    /// A new maximum may not fall below what is already in use.
    pub fn check_new_max(&self, max_value: i32) -> Result<(), String> {
        validate_max_value(max_value)?;
        if max_value != UNLIMITED && max_value < self.current_value {
            return Err(format!(
                "{}: maximum {max_value} is below the {} already in use",
                self.resource.label(),
                self.current_value
            ));
        }
        Ok(())
    }
}

/// Outcome of an atomic check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The counter was incremented; the snapshot is taken after the increment.
    Reserved(Limit),
    /// The limit was already reached; nothing changed.
    Denied(Limit),
}

impl Reservation {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }
}

/// Validate a maximum supplied by configuration or an administrator.
pub fn validate_max_value(max_value: i32) -> Result<(), String> {
    if max_value < UNLIMITED {
        return Err(format!(
            "Limit maximum must be {UNLIMITED} (unlimited) or greater, got {max_value}"
        ));
    }
    Ok(())
}
