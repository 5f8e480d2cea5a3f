//! Administrative roles and the principal acting on the directory.
//!
//! Role names must match the `ck_users_role` check in
//! `crates/db/migrations/20260301000001_accounts_and_domains.sql`.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

pub const ROLE_SUPER_ADMINS: &str = "SuperAdmins";
pub const ROLE_RESELLERS: &str = "Resellers";
pub const ROLE_DOMAIN_ADMINS: &str = "DomainAdmins";
pub const ROLE_SIMPLE_USERS: &str = "SimpleUsers";

/// Role of an account, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    SimpleUsers,
    DomainAdmins,
    Resellers,
    SuperAdmins,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleUsers => ROLE_SIMPLE_USERS,
            Self::DomainAdmins => ROLE_DOMAIN_ADMINS,
            Self::Resellers => ROLE_RESELLERS,
            Self::SuperAdmins => ROLE_SUPER_ADMINS,
        }
    }

    /// Parse a role name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            ROLE_SIMPLE_USERS => Some(Self::SimpleUsers),
            ROLE_DOMAIN_ADMINS => Some(Self::DomainAdmins),
            ROLE_RESELLERS => Some(Self::Resellers),
            ROLE_SUPER_ADMINS => Some(Self::SuperAdmins),
            _ => None,
        }
    }

    /// All valid role names.
    pub const ALL: &'static [&'static str] = &[
        ROLE_SIMPLE_USERS,
        ROLE_DOMAIN_ADMINS,
        ROLE_RESELLERS,
        ROLE_SUPER_ADMINS,
    ];

    /// Whether an account holding `self` may give `target` to another account.
    ///
    /// Super admins grant anything; resellers grant up to `DomainAdmins`;
    /// domain admins only create simple users.
    pub fn can_assign(&self, target: Role) -> bool {
        match self {
            Self::SuperAdmins => true,
            Self::Resellers => target <= Self::DomainAdmins,
            Self::DomainAdmins => target == Self::SimpleUsers,
            Self::SimpleUsers => false,
        }
    }

    /// Whether accounts with this role are subject to resource limits.
    pub fn is_limited(&self) -> bool {
        *self != Self::SuperAdmins
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated account on whose behalf an operation runs.
///
/// Always passed explicitly; nothing in this workspace looks it up from
/// ambient request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: DbId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: DbId, role: Role) -> Self {
        Self { id, role }
    }
}
