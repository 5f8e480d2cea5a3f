//! System-level default limit maximums.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::limits::{validate_max_value, ResourceKind};

/// Default maximum applied when a parameter is not configured.
pub const DEFAULT_LIMIT_VALUE: i32 = 0;

/// Per-kind default maximums inherited by newly created principals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitDefaults {
    values: BTreeMap<ResourceKind, i32>,
}

impl Default for LimitDefaults {
    fn default() -> Self {
        Self::uniform(DEFAULT_LIMIT_VALUE)
    }
}

impl LimitDefaults {
    /// Same maximum for every kind.
    pub fn uniform(max_value: i32) -> Self {
        Self {
            values: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, max_value))
                .collect(),
        }
    }

    /// Load defaults from environment variables.
    ///
    /// | Env Var                            | Default |
    /// |------------------------------------|---------|
    /// | `DEFLT_USER_DOMAINS_LIMIT`         | `0`     |
    /// | `DEFLT_USER_DOMAIN_ALIASES_LIMIT`  | `0`     |
    /// | `DEFLT_USER_DOMAIN_ADMINS_LIMIT`   | `0`     |
    /// | `DEFLT_USER_MAILBOXES_LIMIT`       | `0`     |
    /// | `DEFLT_USER_MAILBOX_ALIASES_LIMIT` | `0`     |
    ///
    /// `-1` means unlimited.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load defaults through an arbitrary parameter lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::default();
        for kind in ResourceKind::ALL {
            let name = kind.default_parameter();
            let Some(raw) = lookup(&name) else {
                continue;
            };
            let value: i32 = raw.trim().parse().map_err(|_| {
                CoreError::Validation(format!("{name} must be an integer, got '{raw}'"))
            })?;
            defaults.set(kind, value)?;
        }
        Ok(defaults)
    }

    pub fn get(&self, kind: ResourceKind) -> i32 {
        self.values
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_LIMIT_VALUE)
    }

    pub fn set(&mut self, kind: ResourceKind, max_value: i32) -> Result<(), CoreError> {
        validate_max_value(max_value).map_err(CoreError::Validation)?;
        self.values.insert(kind, max_value);
        Ok(())
    }

    /// Builder-style variant of [`LimitDefaults::set`].
    pub fn with(mut self, kind: ResourceKind, max_value: i32) -> Result<Self, CoreError> {
        self.set(kind, max_value)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_parameters_fall_back_to_zero() {
        let defaults = LimitDefaults::from_lookup(|_| None).unwrap();
        for kind in ResourceKind::ALL {
            assert_eq!(defaults.get(kind), DEFAULT_LIMIT_VALUE);
        }
    }

    #[test]
    fn parameters_override_defaults() {
        let defaults = LimitDefaults::from_lookup(lookup_from(&[
            ("DEFLT_USER_DOMAINS_LIMIT", "2"),
            ("DEFLT_USER_MAILBOXES_LIMIT", " -1 "),
        ]))
        .unwrap();
        assert_eq!(defaults.get(ResourceKind::Domains), 2);
        assert_eq!(defaults.get(ResourceKind::Mailboxes), -1);
        assert_eq!(defaults.get(ResourceKind::MailboxAliases), 0);
    }

    #[test]
    fn non_integer_parameter_is_rejected() {
        let result =
            LimitDefaults::from_lookup(lookup_from(&[("DEFLT_USER_DOMAINS_LIMIT", "many")]));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("DEFLT_USER_DOMAINS_LIMIT"));
    }

    #[test]
    fn value_below_unlimited_is_rejected() {
        let result =
            LimitDefaults::from_lookup(lookup_from(&[("DEFLT_USER_DOMAIN_ADMINS_LIMIT", "-5")]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn uniform_builder() {
        let defaults = LimitDefaults::uniform(2)
            .with(ResourceKind::Domains, 5)
            .unwrap();
        assert_eq!(defaults.get(ResourceKind::Domains), 5);
        assert_eq!(defaults.get(ResourceKind::DomainAliases), 2);
    }
}
