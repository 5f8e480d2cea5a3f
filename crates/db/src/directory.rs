//! Postgres-backed [`Directory`].
//!
//! Each imported row is written in its own transaction.

use async_trait::async_trait;
use mailadmin_core::directory::{stored_password, Directory};
use mailadmin_core::error::CoreError;
use mailadmin_core::import::row::{
    domain_of, AccountRow, AliasRow, DomainAliasRow, DomainRow, ImportRow,
};
use mailadmin_core::roles::{Principal, Role};
use mailadmin_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{classify, internal};
use crate::models::alias::CreateAlias;
use crate::models::domain::CreateDomain;
use crate::models::domain_alias::CreateDomainAlias;
use crate::models::mailbox::CreateMailbox;
use crate::models::user::CreateUser;
use crate::repositories::{
    AliasRepo, DomainAliasRepo, DomainRepo, MailboxRepo, UserRepo,
};

type Tx<'c> = Transaction<'c, Postgres>;

/// Directory writing domains, accounts and aliases to Postgres.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create_domain(&self, principal: &Principal, row: &DomainRow) -> Result<(), CoreError> {
        let key = format!("Domain {}", row.name);
        let mut tx = self.pool.begin().await.map_err(internal)?;

        if DomainRepo::is_local(&mut tx, &row.name).await.map_err(internal)? {
            return Err(CoreError::Conflict(key));
        }
        let domain = DomainRepo::insert(
            &mut tx,
            &CreateDomain {
                name: row.name.clone(),
                quota_mb: row.quota_mb,
                default_mailbox_quota_mb: row.default_mailbox_quota_mb,
                enabled: row.enabled,
                created_by: Some(principal.id),
            },
        )
        .await
        .map_err(|e| classify(e, "Domain", &row.name))?;
        UserRepo::add_domain_admin(&mut tx, domain.id, principal.id)
            .await
            .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        tracing::debug!(domain_id = domain.id, name = %domain.name, "Domain created");
        Ok(())
    }

    async fn create_domain_alias(
        &self,
        principal: &Principal,
        row: &DomainAliasRow,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        if DomainRepo::is_local(&mut tx, &row.name).await.map_err(internal)? {
            return Err(CoreError::Conflict(format!("Domain alias {}", row.name)));
        }
        let target_id = require_domain(&mut tx, &row.target).await?;
        DomainAliasRepo::insert(
            &mut tx,
            &CreateDomainAlias {
                name: row.name.clone(),
                target_id,
                enabled: row.enabled,
                created_by: Some(principal.id),
            },
        )
        .await
        .map_err(|e| classify(e, "Domain alias", &row.name))?;

        tx.commit().await.map_err(internal)?;
        Ok(())
    }

    async fn create_account(&self, principal: &Principal, row: &AccountRow) -> Result<(), CoreError> {
        let password_hash = stored_password(&row.password)?;
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let mailbox = match row.mailbox_address() {
            Some(address) => {
                let domain = domain_of(address).ok_or_else(|| {
                    CoreError::Validation(format!("'{address}' has no domain part"))
                })?;
                let domain_id = require_domain(&mut tx, domain).await?;
                if MailboxRepo::address_in_use(&mut tx, address)
                    .await
                    .map_err(internal)?
                {
                    return Err(CoreError::Conflict(format!("Mailbox {address}")));
                }
                Some((address, domain_id))
            }
            None => None,
        };
        let mut administered = Vec::with_capacity(row.administered_domains.len());
        for name in &row.administered_domains {
            administered.push(require_domain(&mut tx, name).await?);
        }

        let user = UserRepo::insert(
            &mut tx,
            &CreateUser {
                username: row.username.clone(),
                password_hash: password_hash.to_string(),
                first_name: row.first_name.clone(),
                last_name: row.last_name.clone(),
                role: row.role,
                is_active: row.enabled,
                created_by: Some(principal.id),
            },
        )
        .await
        .map_err(|e| classify(e, "Account", &row.username))?;

        if let Some((address, domain_id)) = mailbox {
            MailboxRepo::insert(
                &mut tx,
                &CreateMailbox {
                    address: address.to_string(),
                    domain_id,
                    user_id: user.id,
                    quota_mb: row.quota_mb,
                    created_by: Some(principal.id),
                },
            )
            .await
            .map_err(|e| classify(e, "Mailbox", address))?;
        }
        for domain_id in administered {
            UserRepo::add_domain_admin(&mut tx, domain_id, user.id)
                .await
                .map_err(internal)?;
        }

        tx.commit().await.map_err(internal)?;
        tracing::debug!(user_id = user.id, username = %user.username, role = %row.role, "Account created");
        Ok(())
    }

    async fn create_alias(&self, principal: &Principal, row: &AliasRow) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        if MailboxRepo::address_in_use(&mut tx, &row.address)
            .await
            .map_err(internal)?
        {
            return Err(CoreError::Conflict(format!("Alias {}", row.address)));
        }
        let domain = domain_of(&row.address).ok_or_else(|| {
            CoreError::Validation(format!("'{}' has no domain part", row.address))
        })?;
        let domain_id = require_domain(&mut tx, domain).await?;
        for recipient in &row.recipients {
            check_recipient(&mut tx, recipient).await?;
        }

        AliasRepo::insert(
            &mut tx,
            &CreateAlias {
                address: row.address.clone(),
                domain_id,
                enabled: row.enabled,
                created_by: Some(principal.id),
                recipients: row.recipients.clone(),
            },
        )
        .await
        .map_err(|e| classify(e, "Alias", &row.address))?;

        tx.commit().await.map_err(internal)?;
        Ok(())
    }
}

async fn require_domain(tx: &mut Tx<'_>, name: &str) -> Result<DbId, CoreError> {
    DomainRepo::find_id(tx, name)
        .await
        .map_err(internal)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Domain",
            key: name.to_string(),
        })
}

/// Local recipients must be an existing mailbox or alias; foreign ones pass.
async fn check_recipient(tx: &mut Tx<'_>, recipient: &str) -> Result<(), CoreError> {
    let domain = domain_of(recipient)
        .ok_or_else(|| CoreError::Validation(format!("'{recipient}' has no domain part")))?;
    if !DomainRepo::is_local(tx, domain).await.map_err(internal)? {
        return Ok(());
    }
    if MailboxRepo::address_in_use(tx, recipient)
        .await
        .map_err(internal)?
    {
        return Ok(());
    }
    Err(CoreError::NotFound {
        entity: "Mailbox",
        key: recipient.to_string(),
    })
}

#[async_trait]
impl Directory for PgDirectory {
    async fn administers_domain(
        &self,
        principal: &Principal,
        domain: &str,
    ) -> Result<bool, CoreError> {
        if principal.role == Role::SuperAdmins {
            let found = DomainRepo::find_by_name(&self.pool, domain)
                .await
                .map_err(internal)?;
            return Ok(found.is_some());
        }
        UserRepo::administers_domain(&self.pool, principal.id, domain)
            .await
            .map_err(internal)
    }

    async fn persist(&self, principal: &Principal, row: &ImportRow) -> Result<(), CoreError> {
        match row {
            ImportRow::Domain(domain) => self.create_domain(principal, domain).await,
            ImportRow::DomainAlias(alias) => self.create_domain_alias(principal, alias).await,
            ImportRow::Account(account) => self.create_account(principal, account).await,
            ImportRow::Alias(alias) => self.create_alias(principal, alias).await,
        }
    }
}
