//! Row kinds, their validated field sets, and line parsing.
//!
//! Pure functions only. A line either becomes a fully validated
//! [`ImportRow`] or a human-readable reason it is malformed.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::limits::ResourceKind;
use crate::roles::Role;

/// Default field separator.
pub const DEFAULT_SEPARATOR: char = ';';

/// Longest domain name accepted (RFC 1035).
pub const MAX_DOMAIN_LENGTH: usize = 253;

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]([a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("valid regex")
});

// ── Row kinds ────────────────────────────────────────────────────────

/// Leading tag of an import line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Domain,
    DomainAlias,
    Account,
    Alias,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::DomainAlias => "domainalias",
            Self::Account => "account",
            Self::Alias => "alias",
        }
    }

    /// Parse a tag, ignoring case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "domain" => Some(Self::Domain),
            "domainalias" => Some(Self::DomainAlias),
            "account" => Some(Self::Account),
            "alias" => Some(Self::Alias),
            _ => None,
        }
    }
}

impl std::fmt::Display for RowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Row field sets ───────────────────────────────────────────────────

/// `domain; <name>; <quota MB>; <enabled>[; <default mailbox quota MB>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRow {
    pub name: String,
    pub quota_mb: i32,
    pub enabled: bool,
    pub default_mailbox_quota_mb: Option<i32>,
}

/// `domainalias; <name>; <target domain>; <enabled>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAliasRow {
    pub name: String,
    pub target: String,
    pub enabled: bool,
}

/// Password column of an account row.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    /// Cleartext as read from the file; hashed before it is stored.
    Plain(String),
    /// Already in stored form.
    Hashed(String),
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(***)"),
            Self::Hashed(_) => f.write_str("Hashed(***)"),
        }
    }
}

/// `account; <username>; <password>; <first name>; <last name>; <enabled>;
/// <role>[; <email>[; <quota MB>[; <administered domain>...]]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub username: String,
    pub password: Password,
    pub first_name: String,
    pub last_name: String,
    pub enabled: bool,
    pub role: Role,
    pub email: Option<String>,
    pub quota_mb: Option<i32>,
    pub administered_domains: Vec<String>,
}

impl AccountRow {
    /// Address of the mailbox created with the account, if any.
    ///
    /// The `email` column wins; otherwise a username that is an address.
    pub fn mailbox_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or_else(|| self.username.contains('@').then_some(self.username.as_str()))
    }
}

/// `alias; <address>; <enabled>; <recipient>[; <recipient>...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRow {
    pub address: String,
    pub enabled: bool,
    pub recipients: Vec<String>,
}

/// One validated import row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRow {
    Domain(DomainRow),
    DomainAlias(DomainAliasRow),
    Account(AccountRow),
    Alias(AliasRow),
}

impl ImportRow {
    pub fn kind(&self) -> RowKind {
        match self {
            Self::Domain(_) => RowKind::Domain,
            Self::DomainAlias(_) => RowKind::DomainAlias,
            Self::Account(_) => RowKind::Account,
            Self::Alias(_) => RowKind::Alias,
        }
    }

    /// Limit category this row counts against.
    ///
    /// Reseller and super admin accounts are not metered.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Domain(_) => Some(ResourceKind::Domains),
            Self::DomainAlias(_) => Some(ResourceKind::DomainAliases),
            Self::Account(account) => match account.role {
                Role::DomainAdmins => Some(ResourceKind::DomainAdmins),
                Role::SimpleUsers => Some(ResourceKind::Mailboxes),
                Role::Resellers | Role::SuperAdmins => None,
            },
            Self::Alias(_) => Some(ResourceKind::MailboxAliases),
        }
    }

    /// Name used to refer to the created object in messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Domain(row) => format!("Domain {}", row.name),
            Self::DomainAlias(row) => format!("Domain alias {}", row.name),
            Self::Account(row) => format!("Account {}", row.username),
            Self::Alias(row) => format!("Alias {}", row.address),
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────

/// Parse one non-blank line.
///
/// `plain_passwords` tells whether account passwords in the file are
/// cleartext (to be hashed) or already hashed.
pub fn parse_line(line: &str, separator: char, plain_passwords: bool) -> Result<ImportRow, String> {
    let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
    let tag = fields.first().copied().unwrap_or_default();
    let kind = RowKind::from_tag(tag).ok_or_else(|| format!("unknown row type '{tag}'"))?;
    let fields = &fields[1..];

    match kind {
        RowKind::Domain => parse_domain(fields).map(ImportRow::Domain),
        RowKind::DomainAlias => parse_domain_alias(fields).map(ImportRow::DomainAlias),
        RowKind::Account => parse_account(fields, plain_passwords).map(ImportRow::Account),
        RowKind::Alias => parse_alias(fields).map(ImportRow::Alias),
    }
}

fn parse_domain(fields: &[&str]) -> Result<DomainRow, String> {
    expect_fields(RowKind::Domain, fields, 3, Some(4))?;
    Ok(DomainRow {
        name: parse_domain_name(fields[0])?,
        quota_mb: parse_quota(fields[1])?,
        enabled: parse_bool(fields[2])?,
        default_mailbox_quota_mb: fields.get(3).map(|v| parse_quota(v)).transpose()?,
    })
}

fn parse_domain_alias(fields: &[&str]) -> Result<DomainAliasRow, String> {
    expect_fields(RowKind::DomainAlias, fields, 3, Some(3))?;
    Ok(DomainAliasRow {
        name: parse_domain_name(fields[0])?,
        target: parse_domain_name(fields[1])?,
        enabled: parse_bool(fields[2])?,
    })
}

fn parse_account(fields: &[&str], plain_passwords: bool) -> Result<AccountRow, String> {
    expect_fields(RowKind::Account, fields, 6, None)?;

    let username = fields[0].to_lowercase();
    if username.is_empty() {
        return Err("empty username".to_string());
    }
    if fields[1].is_empty() {
        return Err(format!("empty password for {username}"));
    }
    let password = if plain_passwords {
        Password::Plain(fields[1].to_string())
    } else {
        Password::Hashed(fields[1].to_string())
    };
    let role = Role::from_str(fields[5]).ok_or_else(|| {
        format!(
            "unknown role '{}' (expected one of {})",
            fields[5],
            Role::ALL.join(", ")
        )
    })?;
    let email = match fields.get(6) {
        Some(value) if !value.is_empty() => Some(parse_address(value)?),
        _ => None,
    };
    let quota_mb = match fields.get(7) {
        Some(value) if !value.is_empty() => Some(parse_quota(value)?),
        _ => None,
    };
    let administered_domains = fields
        .iter()
        .skip(8)
        .filter(|value| !value.is_empty())
        .map(|value| parse_domain_name(value))
        .collect::<Result<Vec<_>, _>>()?;

    let row = AccountRow {
        username,
        password,
        first_name: fields[2].to_string(),
        last_name: fields[3].to_string(),
        enabled: parse_bool(fields[4])?,
        role,
        email,
        quota_mb,
        administered_domains,
    };

    if row.role != Role::DomainAdmins && !row.administered_domains.is_empty() {
        return Err(format!(
            "only {} accounts administer domains",
            Role::DomainAdmins
        ));
    }
    if row.role <= Role::DomainAdmins {
        match row.mailbox_address() {
            Some(address) => {
                parse_address(address)?;
            }
            None => return Err(format!("account {} needs a mailbox address", row.username)),
        }
    }
    Ok(row)
}

fn parse_alias(fields: &[&str]) -> Result<AliasRow, String> {
    expect_fields(RowKind::Alias, fields, 3, None)?;
    let recipients = fields[2..]
        .iter()
        .filter(|value| !value.is_empty())
        .map(|value| parse_address(value))
        .collect::<Result<Vec<_>, _>>()?;
    if recipients.is_empty() {
        return Err("alias without recipients".to_string());
    }
    Ok(AliasRow {
        address: parse_address(fields[0])?,
        enabled: parse_bool(fields[1])?,
        recipients,
    })
}

// ── Field helpers ────────────────────────────────────────────────────

fn expect_fields(kind: RowKind, fields: &[&str], min: usize, max: Option<usize>) -> Result<(), String> {
    let count = fields.len();
    let ok = count >= min && max.map_or(true, |max| count <= max);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    Err(format!("{kind} rows take {expected} fields, got {count}"))
}

/// Parse a boolean-like column.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("'{value}' is not a boolean")),
    }
}

/// Parse a non-negative quota in megabytes.
pub fn parse_quota(value: &str) -> Result<i32, String> {
    match value.parse::<i32>() {
        Ok(quota) if quota >= 0 => Ok(quota),
        _ => Err(format!("'{value}' is not a valid quota")),
    }
}

/// Validate and normalise a domain name.
pub fn parse_domain_name(value: &str) -> Result<String, String> {
    let name = value.to_lowercase();
    if name.len() > MAX_DOMAIN_LENGTH || !DOMAIN_RE.is_match(&name) {
        return Err(format!("'{value}' is not a valid domain name"));
    }
    Ok(name)
}

/// Validate and normalise an e-mail address.
pub fn parse_address(value: &str) -> Result<String, String> {
    let address = value.to_lowercase();
    if !address.validate_email() {
        return Err(format!("'{value}' is not a valid e-mail address"));
    }
    Ok(address)
}

/// Domain part of an address (`None` when there is no `@`).
pub fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

// ── Tests ────────────────────────────────────────────────────────────
