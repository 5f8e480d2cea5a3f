//! The bulk importer.
//!
//! Rows are applied strictly in input order. Each row goes through
//! validation, authorization, reservation and creation; a row that fails at
//! any step is reported and the import moves on to the next line.

use tracing::{debug, error, info, warn};

use super::decode::decode_source;
use super::report::{ImportReport, RowFailure, RowOutcome};
use super::row::{domain_of, parse_line, ImportRow, RowKind, DEFAULT_SEPARATOR};
use crate::directory::Directory;
use crate::error::CoreError;
use crate::limits::{Reservation, ResourceKind};
use crate::password;
use crate::registry::LimitRegistry;
use crate::roles::{Principal, Role};

/// Knobs of an import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Field separator.
    pub separator: char,
    /// Report rows whose entity already exists as skipped instead of failed.
    pub continue_if_exists: bool,
    /// Passwords in the file are cleartext and get hashed before storage.
    pub crypt_passwords: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            continue_if_exists: false,
            crypt_passwords: true,
        }
    }
}

/// Result of a row that did not fail.
#[derive(Debug)]
enum Applied {
    Created,
    Skipped(String),
}

/// Applies import files on behalf of a principal.
pub struct Importer<'a> {
    registry: &'a dyn LimitRegistry,
    directory: &'a dyn Directory,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    pub fn new(registry: &'a dyn LimitRegistry, directory: &'a dyn Directory) -> Self {
        Self {
            registry,
            directory,
            options: ImportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import `source` as `principal`.
    ///
    /// Only undecodable input fails the whole call; everything else ends up
    /// as a row outcome in the report.
    pub async fn run(
        &self,
        principal: &Principal,
        source: &[u8],
    ) -> Result<ImportReport, CoreError> {
        let text = decode_source(source)?;
        let mut report = ImportReport::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let outcome = self.import_line(principal, index + 1, line).await;
            debug!(
                line = outcome.line,
                status = outcome.status.as_str(),
                message = outcome.message.as_deref().unwrap_or(""),
                "Import row processed"
            );
            report.record(outcome);
        }

        info!(
            principal_id = principal.id,
            status = %report.status,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "Import finished"
        );
        Ok(report)
    }

    async fn import_line(&self, principal: &Principal, number: usize, line: &str) -> RowOutcome {
        let row = match parse_line(line, self.options.separator, self.options.crypt_passwords) {
            Ok(row) => row,
            Err(reason) => {
                let kind = line
                    .split(self.options.separator)
                    .next()
                    .and_then(|tag| RowKind::from_tag(tag.trim()));
                return RowOutcome::failed(number, kind, RowFailure::InvalidRow(reason));
            }
        };

        let kind = row.kind();
        match self.apply(principal, row).await {
            Ok(Applied::Created) => RowOutcome::created(number, kind),
            Ok(Applied::Skipped(message)) => RowOutcome::skipped(number, kind, message),
            Err(failure) => RowOutcome::failed(number, Some(kind), failure),
        }
    }

    /// Authorize, reserve, then create. A reservation taken here is handed
    /// back when creation fails.
    async fn apply(&self, principal: &Principal, row: ImportRow) -> Result<Applied, RowFailure> {
        self.authorize(principal, &row).await?;

        let reserved = match row.resource_kind() {
            Some(resource) => self.reserve(principal, resource).await?,
            None => None,
        };

        match self.create(principal, row).await {
            Ok(()) => Ok(Applied::Created),
            Err(err) => {
                if let Some(resource) = reserved {
                    self.compensate(principal, resource).await;
                }
                match err {
                    CoreError::Conflict(what) if self.options.continue_if_exists => {
                        Ok(Applied::Skipped(format!("{what} already exists")))
                    }
                    other => Err(failure_from(other)),
                }
            }
        }
    }

    async fn authorize(&self, principal: &Principal, row: &ImportRow) -> Result<(), RowFailure> {
        match row {
            // A missing alias target surfaces from `persist` as not found.
            ImportRow::Domain(_) | ImportRow::DomainAlias(_) => {
                require(principal.role >= Role::Resellers)
            }
            ImportRow::Account(account) => {
                require(principal.role.can_assign(account.role))?;
                if let Some(address) = account.mailbox_address() {
                    self.require_domain(principal, domain_of(address).unwrap_or_default())
                        .await?;
                }
                for domain in &account.administered_domains {
                    self.require_domain(principal, domain).await?;
                }
                Ok(())
            }
            ImportRow::Alias(alias) => {
                self.require_domain(principal, domain_of(&alias.address).unwrap_or_default())
                    .await
            }
        }
    }

    async fn require_domain(&self, principal: &Principal, domain: &str) -> Result<(), RowFailure> {
        match self.directory.administers_domain(principal, domain).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(RowFailure::PermissionDenied),
            Err(err) => Err(failure_from(err)),
        }
    }

    /// Returns the reserved kind, or `None` when the row is not metered.
    async fn reserve(
        &self,
        principal: &Principal,
        resource: ResourceKind,
    ) -> Result<Option<ResourceKind>, RowFailure> {
        if !principal.role.is_limited() {
            return Ok(None);
        }
        match self.registry.reserve(principal.id, resource).await {
            Ok(Reservation::Reserved(limit)) => {
                debug!(
                    principal_id = principal.id,
                    resource = %resource,
                    current = limit.current_value,
                    max = limit.max_value,
                    "Limit reserved"
                );
                Ok(Some(resource))
            }
            Ok(Reservation::Denied(limit)) => {
                info!(
                    principal_id = principal.id,
                    resource = %resource,
                    max = limit.max_value,
                    "Limit reached"
                );
                Err(limit_failure(resource))
            }
            Err(CoreError::NotFound { .. }) => {
                debug!(
                    principal_id = principal.id,
                    resource = %resource,
                    "No limit configured, row not metered"
                );
                Ok(None)
            }
            Err(err) => {
                error!(principal_id = principal.id, resource = %resource, error = %err, "Limit reservation failed");
                Err(RowFailure::Internal)
            }
        }
    }

    async fn create(&self, principal: &Principal, row: ImportRow) -> Result<(), CoreError> {
        let row = match row {
            ImportRow::Account(mut account) => {
                account.password = password::seal(account.password)
                    .map_err(|e| CoreError::Internal(format!("Password hashing failed: {e}")))?;
                ImportRow::Account(account)
            }
            other => other,
        };
        self.directory.persist(principal, &row).await
    }

    async fn compensate(&self, principal: &Principal, resource: ResourceKind) {
        match self.registry.release(principal.id, resource).await {
            Ok(limit) => warn!(
                principal_id = principal.id,
                resource = %resource,
                current = limit.current_value,
                "Creation failed, reservation released"
            ),
            Err(err) => error!(
                principal_id = principal.id,
                resource = %resource,
                error = %err,
                "Creation failed and the reservation could not be released"
            ),
        }
    }
}

fn require(allowed: bool) -> Result<(), RowFailure> {
    if allowed {
        Ok(())
    } else {
        Err(RowFailure::PermissionDenied)
    }
}

/// Denials on `domain_admins` are permission errors: the row would grant a
/// role the principal may no longer hand out.
fn limit_failure(resource: ResourceKind) -> RowFailure {
    match resource {
        ResourceKind::DomainAdmins => {
            RowFailure::PermissionDeniedWith(RowFailure::LimitReached(resource).to_string())
        }
        _ => RowFailure::LimitReached(resource),
    }
}

fn failure_from(err: CoreError) -> RowFailure {
    match err {
        CoreError::Conflict(what) => RowFailure::AlreadyExists(what),
        CoreError::NotFound { entity, key } => RowFailure::NotFound(format!("{entity} {key}")),
        CoreError::Validation(msg) => RowFailure::Rejected(msg),
        CoreError::Forbidden(msg) => RowFailure::PermissionDeniedWith(msg),
        CoreError::Internal(msg) => {
            error!(error = %msg, "Import row failed");
            RowFailure::Internal
        }
    }
}
