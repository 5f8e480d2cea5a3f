//! The directory collaborator: administrative scope lookups and entity
//! persistence, plus an in-memory implementation.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::import::row::{domain_of, ImportRow, Password};
use crate::roles::{Principal, Role};
use crate::types::DbId;

/// Where imported entities are created.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether `principal` holds admin rights over `domain`.
    async fn administers_domain(
        &self,
        principal: &Principal,
        domain: &str,
    ) -> Result<bool, CoreError>;

    /// Create the entity described by `row`, owned by `principal`.
    ///
    /// Account passwords must already be [`Password::Hashed`]. Fails with
    /// [`CoreError::Conflict`] when the entity exists and
    /// [`CoreError::NotFound`] when something it points to is missing.
    async fn persist(&self, principal: &Principal, row: &ImportRow) -> Result<(), CoreError>;
}

/// Super admins administer every domain; everyone else needs an explicit grant.
pub fn has_domain_rights(principal: &Principal, admins: &BTreeSet<DbId>) -> bool {
    principal.role == Role::SuperAdmins || admins.contains(&principal.id)
}

/// Stored password of an account row, rejecting cleartext.
pub fn stored_password(password: &Password) -> Result<&str, CoreError> {
    match password {
        Password::Hashed(hash) => Ok(hash),
        Password::Plain(_) => Err(CoreError::Validation(
            "refusing to store a cleartext password".to_string(),
        )),
    }
}

// ── In-memory directory ──────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DomainEntry {
    enabled: bool,
    admins: BTreeSet<DbId>,
    created_by: Option<DbId>,
}

#[derive(Debug, Clone)]
struct AccountEntry {
    id: DbId,
    role: Role,
    mailbox: Option<String>,
    password_hash: String,
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_account_id: DbId,
    domains: HashMap<String, DomainEntry>,
    domain_aliases: HashMap<String, String>,
    accounts: HashMap<String, AccountEntry>,
    mailboxes: BTreeSet<String>,
    aliases: HashMap<String, Vec<String>>,
}

impl DirectoryState {
    fn domain(&self, name: &str) -> Result<&DomainEntry, CoreError> {
        self.domains.get(name).ok_or_else(|| CoreError::NotFound {
            entity: "Domain",
            key: name.to_string(),
        })
    }

    fn domain_of_address<'a>(&self, address: &'a str) -> Result<&'a str, CoreError> {
        domain_of(address)
            .ok_or_else(|| CoreError::Validation(format!("'{address}' has no domain part")))
    }

    /// Local addresses must resolve to a mailbox or alias; foreign ones pass.
    fn check_recipient(&self, recipient: &str) -> Result<(), CoreError> {
        let domain = self.domain_of_address(recipient)?;
        let local = self.domains.contains_key(domain) || self.domain_aliases.contains_key(domain);
        if local && !self.mailboxes.contains(recipient) && !self.aliases.contains_key(recipient) {
            return Err(CoreError::NotFound {
                entity: "Mailbox",
                key: recipient.to_string(),
            });
        }
        Ok(())
    }

    fn persist(&mut self, principal: &Principal, row: &ImportRow) -> Result<(), CoreError> {
        match row {
            ImportRow::Domain(domain) => {
                if self.domains.contains_key(&domain.name)
                    || self.domain_aliases.contains_key(&domain.name)
                {
                    return Err(CoreError::Conflict(format!("Domain {}", domain.name)));
                }
                self.domains.insert(
                    domain.name.clone(),
                    DomainEntry {
                        enabled: domain.enabled,
                        admins: BTreeSet::from([principal.id]),
                        created_by: Some(principal.id),
                    },
                );
            }
            ImportRow::DomainAlias(alias) => {
                if self.domains.contains_key(&alias.name)
                    || self.domain_aliases.contains_key(&alias.name)
                {
                    return Err(CoreError::Conflict(format!("Domain alias {}", alias.name)));
                }
                self.domain(&alias.target)?;
                self.domain_aliases
                    .insert(alias.name.clone(), alias.target.clone());
            }
            ImportRow::Account(account) => {
                let password_hash = stored_password(&account.password)?.to_string();
                if self.accounts.contains_key(&account.username) {
                    return Err(CoreError::Conflict(format!("Account {}", account.username)));
                }
                let mailbox = account.mailbox_address().map(str::to_string);
                if let Some(address) = &mailbox {
                    self.domain(self.domain_of_address(address)?)?;
                    if self.mailboxes.contains(address) || self.aliases.contains_key(address) {
                        return Err(CoreError::Conflict(format!("Mailbox {address}")));
                    }
                }
                for name in &account.administered_domains {
                    self.domain(name)?;
                }

                self.next_account_id += 1;
                let id = self.next_account_id;
                for name in &account.administered_domains {
                    if let Some(entry) = self.domains.get_mut(name) {
                        entry.admins.insert(id);
                    }
                }
                if let Some(address) = &mailbox {
                    self.mailboxes.insert(address.clone());
                }
                self.accounts.insert(
                    account.username.clone(),
                    AccountEntry {
                        id,
                        role: account.role,
                        mailbox,
                        password_hash,
                    },
                );
            }
            ImportRow::Alias(alias) => {
                if self.aliases.contains_key(&alias.address) || self.mailboxes.contains(&alias.address)
                {
                    return Err(CoreError::Conflict(format!("Alias {}", alias.address)));
                }
                self.domain(self.domain_of_address(&alias.address)?)?;
                for recipient in &alias.recipients {
                    self.check_recipient(recipient)?;
                }
                self.aliases
                    .insert(alias.address.clone(), alias.recipients.clone());
            }
        }
        Ok(())
    }
}

/// Directory held entirely in memory.
///
/// Seeding helpers bypass limits and permission checks; they model data
/// that existed before an import.
#[derive(Debug)]
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                next_account_id: 1000,
                ..DirectoryState::default()
            }),
        }
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a domain, optionally administered by `admin`.
    pub async fn add_domain(&self, name: &str, admin: Option<DbId>) {
        let mut state = self.state.lock().await;
        state.domains.insert(
            name.to_string(),
            DomainEntry {
                enabled: true,
                admins: admin.into_iter().collect(),
                created_by: None,
            },
        );
    }

    /// Grant `principal_id` admin rights over an existing domain.
    pub async fn add_domain_admin(&self, domain: &str, principal_id: DbId) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let entry = state.domains.get_mut(domain).ok_or_else(|| CoreError::NotFound {
            entity: "Domain",
            key: domain.to_string(),
        })?;
        entry.admins.insert(principal_id);
        Ok(())
    }

    /// Seed a mailbox address.
    pub async fn add_mailbox(&self, address: &str) {
        self.state.lock().await.mailboxes.insert(address.to_string());
    }

    pub async fn has_domain(&self, name: &str) -> bool {
        self.state.lock().await.domains.contains_key(name)
    }

    pub async fn is_domain_enabled(&self, name: &str) -> Option<bool> {
        self.state.lock().await.domains.get(name).map(|d| d.enabled)
    }

    /// Creator of a domain, `None` for seeded domains.
    pub async fn domain_creator(&self, name: &str) -> Option<DbId> {
        self.state
            .lock()
            .await
            .domains
            .get(name)
            .and_then(|d| d.created_by)
    }

    pub async fn has_domain_alias(&self, name: &str) -> bool {
        self.state.lock().await.domain_aliases.contains_key(name)
    }

    pub async fn has_mailbox(&self, address: &str) -> bool {
        self.state.lock().await.mailboxes.contains(address)
    }

    pub async fn has_alias(&self, address: &str) -> bool {
        self.state.lock().await.aliases.contains_key(address)
    }

    /// Role and mailbox of an imported account.
    pub async fn account(&self, username: &str) -> Option<(Role, Option<String>)> {
        self.state
            .lock()
            .await
            .accounts
            .get(username)
            .map(|a| (a.role, a.mailbox.clone()))
    }

    pub async fn password_hash(&self, username: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .accounts
            .get(username)
            .map(|a| a.password_hash.clone())
    }

    /// Principals administering `domain`.
    pub async fn domain_admins(&self, domain: &str) -> Vec<DbId> {
        self.state
            .lock()
            .await
            .domains
            .get(domain)
            .map(|d| d.admins.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Principal view of an imported account.
    pub async fn principal_for(&self, username: &str) -> Option<Principal> {
        self.state
            .lock()
            .await
            .accounts
            .get(username)
            .map(|a| Principal::new(a.id, a.role))
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn administers_domain(
        &self,
        principal: &Principal,
        domain: &str,
    ) -> Result<bool, CoreError> {
        let state = self.state.lock().await;
        Ok(state
            .domains
            .get(domain)
            .is_some_and(|entry| has_domain_rights(principal, &entry.admins)))
    }

    async fn persist(&self, principal: &Principal, row: &ImportRow) -> Result<(), CoreError> {
        self.state.lock().await.persist(principal, row)
    }
}
