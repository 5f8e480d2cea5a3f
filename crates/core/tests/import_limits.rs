//! Integration tests for limit enforcement during bulk import.
//!
//! Drives the importer against the in-memory registry and directory:
//! - Per-category limit scenarios (domains, domain aliases, domain admins,
//!   mailboxes, mailbox aliases)
//! - Permission checks consuming no reservation
//! - Compensating release after a failed creation
//! - `continue_if_exists`, malformed rows, undecodable input

use assert_matches::assert_matches;
use mailadmin_core::config::LimitDefaults;
use mailadmin_core::directory::MemoryDirectory;
use mailadmin_core::error::CoreError;
use mailadmin_core::import::{
    ImportOptions, ImportStatus, Importer, RowFailure, RowKind, RowStatus,
};
use mailadmin_core::limits::{ResourceKind, UNLIMITED};
use mailadmin_core::password;
use mailadmin_core::registry::{LimitRegistry, MemoryLimitRegistry};
use mailadmin_core::roles::{Principal, Role};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const RESELLER: Principal = Principal {
    id: 10,
    role: Role::Resellers,
};

const DOMAIN_ADMIN: Principal = Principal {
    id: 20,
    role: Role::DomainAdmins,
};

const SUPER_ADMIN: Principal = Principal {
    id: 1,
    role: Role::SuperAdmins,
};

struct Fixture {
    registry: MemoryLimitRegistry,
    directory: MemoryDirectory,
}

impl Fixture {
    fn importer(&self) -> Importer<'_> {
        Importer::new(&self.registry, &self.directory).with_options(hashed_passwords())
    }

    async fn current(&self, principal: &Principal, resource: ResourceKind) -> i32 {
        self.registry
            .get(principal.id, resource)
            .await
            .unwrap()
            .current_value
    }

    async fn exceeded(&self, principal: &Principal, resource: ResourceKind) -> bool {
        self.registry
            .is_exceeded(principal.id, resource)
            .await
            .unwrap()
    }
}

/// Every default limit set to 2, `test.com` administered by the domain admin
/// and holding `admin@test.com` and `user@test.com`.
async fn fixture() -> Fixture {
    let defaults = LimitDefaults::uniform(2);
    let registry = MemoryLimitRegistry::new();
    registry
        .provision(RESELLER.id, RESELLER.role, &defaults)
        .await
        .unwrap();
    registry
        .provision(DOMAIN_ADMIN.id, DOMAIN_ADMIN.role, &defaults)
        .await
        .unwrap();

    let directory = MemoryDirectory::new();
    directory.add_domain("test.com", Some(DOMAIN_ADMIN.id)).await;
    directory.add_mailbox("admin@test.com").await;
    directory.add_mailbox("user@test.com").await;

    Fixture {
        registry,
        directory,
    }
}

/// Passwords in these files are stored as-is; hashing is covered separately.
fn hashed_passwords() -> ImportOptions {
    ImportOptions {
        crypt_passwords: false,
        ..ImportOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Limit scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_domains_limit() {
    let fx = fixture().await;
    assert!(!fx.exceeded(&RESELLER, ResourceKind::Domains).await);

    let report = fx
        .importer()
        .run(
            &RESELLER,
            b"domain; domain1.com; 100; True\ndomain; domain2.com; 200; False\n",
        )
        .await
        .unwrap();
    assert_eq!(report.status, ImportStatus::Completed);
    assert_eq!(report.created, 2);
    assert!(fx.exceeded(&RESELLER, ResourceKind::Domains).await);
    assert_eq!(fx.directory.is_domain_enabled("domain2.com").await, Some(false));
    assert_eq!(fx.directory.domain_creator("domain1.com").await, Some(RESELLER.id));

    let report = fx
        .importer()
        .run(&RESELLER, b"domain; domain3.com; 100; True\n")
        .await
        .unwrap();
    assert_eq!(report.status, ImportStatus::Failed);
    assert!(report.mentions("Domains: limit reached"));
    assert!(!fx.directory.has_domain("domain3.com").await);
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 2);
}

#[tokio::test]
async fn test_domain_aliases_limit() {
    let fx = fixture().await;
    assert!(!fx.exceeded(&RESELLER, ResourceKind::DomainAliases).await);

    let report = fx
        .importer()
        .run(
            &RESELLER,
            b"domainalias; domalias1.com; test.com; True\ndomainalias; domalias2.com; test.com; True\n",
        )
        .await
        .unwrap();
    assert_eq!(report.created, 2);
    assert!(fx.exceeded(&RESELLER, ResourceKind::DomainAliases).await);

    let report = fx
        .importer()
        .run(&RESELLER, b"domainalias; domalias3.com; test.com; True")
        .await
        .unwrap();
    assert!(report.mentions("Domain aliases: limit reached"));
    assert!(!fx.directory.has_domain_alias("domalias3.com").await);
}

#[tokio::test]
async fn test_domain_alias_to_missing_domain_gives_slot_back() {
    let fx = fixture().await;
    let report = fx
        .importer()
        .run(&RESELLER, b"domainalias; domalias1.com; nowhere.com; True\n")
        .await
        .unwrap();
    assert_eq!(
        report.rows[0].message.as_deref(),
        Some("Domain nowhere.com not found")
    );
    assert!(!fx.directory.has_domain_alias("domalias1.com").await);
    assert_eq!(fx.current(&RESELLER, ResourceKind::DomainAliases).await, 0);
}

#[tokio::test]
async fn test_domain_admins_limit() {
    let fx = fixture().await;
    fx.directory
        .add_domain_admin("test.com", RESELLER.id)
        .await
        .unwrap();
    assert!(!fx.exceeded(&RESELLER, ResourceKind::DomainAdmins).await);

    let source = "account; admin1@test.com; toto; User; One; True; DomainAdmins; user1@test.com; 5; test.com\n\
                  account; admin2@test.com; toto; René; Truc; True; DomainAdmins; truc@test.com; 5; test.com\n";
    let report = fx.importer().run(&RESELLER, source.as_bytes()).await.unwrap();
    assert_eq!(report.created, 2, "{:?}", report.rows);
    assert!(fx.exceeded(&RESELLER, ResourceKind::DomainAdmins).await);
    assert_eq!(
        fx.directory.account("admin1@test.com").await,
        Some((Role::DomainAdmins, Some("user1@test.com".to_string())))
    );
    let admin1 = fx.directory.principal_for("admin1@test.com").await.unwrap();
    assert!(fx.directory.domain_admins("test.com").await.contains(&admin1.id));

    let report = fx
        .importer()
        .run(
            &RESELLER,
            b"account; admin3@test.com; toto; User; One; True; DomainAdmins; admin3@test.com; 5; test.com\n",
        )
        .await
        .unwrap();
    assert!(report.mentions("Permission denied"));
    assert_eq!(
        report.rows[0].message.as_deref(),
        Some("Permission denied: Domain admins: limit reached")
    );
    assert!(fx.directory.account("admin3@test.com").await.is_none());
}

#[tokio::test]
async fn test_mailboxes_limit() {
    let fx = fixture().await;
    assert!(!fx.exceeded(&DOMAIN_ADMIN, ResourceKind::Mailboxes).await);

    let source = "account; user1@test.com; toto; User; One; True; SimpleUsers; user1@test.com; 5\n\
                  account; truc@test.com; toto; René; Truc; True; SimpleUsers; truc@test.com; 5\n";
    let report = fx
        .importer()
        .run(&DOMAIN_ADMIN, source.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.created, 2, "{:?}", report.rows);
    assert!(fx.exceeded(&DOMAIN_ADMIN, ResourceKind::Mailboxes).await);
    assert!(fx.directory.has_mailbox("truc@test.com").await);

    let report = fx
        .importer()
        .run(
            &DOMAIN_ADMIN,
            b"\naccount; user3@test.com; toto; User; One; True; SimpleUsers; user3@test.com; 5\n",
        )
        .await
        .unwrap();
    assert!(report.mentions("Mailboxes: limit reached"));
    assert_eq!(report.rows[0].line, 2);
    assert!(!fx.directory.has_mailbox("user3@test.com").await);
}

#[tokio::test]
async fn test_mailbox_aliases_limit() {
    let fx = fixture().await;
    assert!(!fx.exceeded(&DOMAIN_ADMIN, ResourceKind::MailboxAliases).await);

    let report = fx
        .importer()
        .run(
            &DOMAIN_ADMIN,
            b"alias; alias1@test.com; True; user@test.com\nalias; alias2@test.com; True; user@test.com\n",
        )
        .await
        .unwrap();
    assert_eq!(report.created, 2);
    assert!(fx.exceeded(&DOMAIN_ADMIN, ResourceKind::MailboxAliases).await);

    let report = fx
        .importer()
        .run(&DOMAIN_ADMIN, b"\nalias; alias3@test.com; True; user@test.com\n")
        .await
        .unwrap();
    assert!(report.mentions("Mailbox aliases: limit reached"));
    assert!(!fx.directory.has_alias("alias3@test.com").await);
}

// ---------------------------------------------------------------------------
// Incremental enforcement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rows_past_the_limit_fail_while_earlier_rows_stay() {
    let fx = fixture().await;
    let source = b"domain; a.com; 10; true\n\
                   domain; b.com; 10; true\n\
                   domain; c.com; 10; true\n";
    let report = fx.importer().run(&RESELLER, source).await.unwrap();

    assert_eq!(report.status, ImportStatus::Partial);
    assert_eq!(report.summary(), "2 created, 0 skipped, 1 failed");
    let statuses: Vec<RowStatus> = report.rows.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![RowStatus::Created, RowStatus::Created, RowStatus::Failed]
    );
    assert_matches!(
        report.rows[2].failure,
        Some(RowFailure::LimitReached(ResourceKind::Domains))
    );
    assert!(fx.directory.has_domain("a.com").await);
    assert!(fx.directory.has_domain("b.com").await);
}

#[tokio::test]
async fn test_rerun_without_headroom_rejects_every_row_the_same_way() {
    let fx = fixture().await;
    let source = b"domain; a.com; 10; true\ndomain; b.com; 10; true\n";
    fx.importer().run(&RESELLER, source).await.unwrap();

    let report = fx.importer().run(&RESELLER, source).await.unwrap();
    assert_eq!(report.failed, 2);
    for row in &report.rows {
        assert_eq!(row.message.as_deref(), Some("Domains: limit reached"));
    }
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 2);
}

#[tokio::test]
async fn test_unlimited_principal_is_still_counted() {
    let fx = fixture().await;
    fx.registry
        .set_max(RESELLER.id, ResourceKind::Domains, UNLIMITED)
        .await
        .unwrap();

    let source = b"domain; a.com; 1; true\ndomain; b.com; 1; true\ndomain; c.com; 1; true\n";
    let report = fx.importer().run(&RESELLER, source).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 3);
    assert!(!fx.exceeded(&RESELLER, ResourceKind::Domains).await);
}

#[tokio::test]
async fn test_super_admin_is_not_metered() {
    let fx = fixture().await;
    let source = b"domain; a.com; 1; true\ndomain; b.com; 1; true\ndomain; c.com; 1; true\n";
    let report = fx.importer().run(&SUPER_ADMIN, source).await.unwrap();
    assert_eq!(report.created, 3);
    assert_matches!(
        fx.registry.get(SUPER_ADMIN.id, ResourceKind::Domains).await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_principal_without_limit_record_is_not_metered() {
    let fx = fixture().await;
    let newcomer = Principal::new(99, Role::Resellers);
    let report = fx
        .importer()
        .run(&newcomer, b"domain; a.com; 1; true\ndomain; b.com; 1; true\ndomain; c.com; 1; true\n")
        .await
        .unwrap();
    assert_eq!(report.created, 3);
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_domain_admin_grant_outside_scope_consumes_nothing() {
    let fx = fixture().await;
    fx.directory.add_domain("other.com", None).await;

    let report = fx
        .importer()
        .run(
            &RESELLER,
            b"account; boss@other.com; toto; Big; Boss; True; DomainAdmins; boss@other.com; 5; other.com\n",
        )
        .await
        .unwrap();
    assert_eq!(report.rows[0].message.as_deref(), Some("Permission denied"));
    assert_eq!(fx.current(&RESELLER, ResourceKind::DomainAdmins).await, 0);
    assert!(fx.directory.account("boss@other.com").await.is_none());
}

#[tokio::test]
async fn test_domain_admin_cannot_import_domains() {
    let fx = fixture().await;
    let report = fx
        .importer()
        .run(&DOMAIN_ADMIN, b"domain; mine.com; 10; true\n")
        .await
        .unwrap();
    assert_matches!(report.rows[0].failure, Some(RowFailure::PermissionDenied));
    assert!(!fx.directory.has_domain("mine.com").await);
}

#[tokio::test]
async fn test_domain_admin_cannot_grant_its_own_role() {
    let fx = fixture().await;
    let report = fx
        .importer()
        .run(
            &DOMAIN_ADMIN,
            b"account; peer@test.com; toto; Peer; Admin; True; DomainAdmins; peer@test.com; 5; test.com\n",
        )
        .await
        .unwrap();
    assert!(report.mentions("Permission denied"));
    assert_eq!(fx.current(&DOMAIN_ADMIN, ResourceKind::Mailboxes).await, 0);
}

#[tokio::test]
async fn test_alias_in_foreign_domain_is_denied() {
    let fx = fixture().await;
    fx.directory.add_domain("other.com", None).await;
    let report = fx
        .importer()
        .run(&DOMAIN_ADMIN, b"alias; sales@other.com; true; user@test.com\n")
        .await
        .unwrap();
    assert!(report.mentions("Permission denied"));
    assert_eq!(fx.current(&DOMAIN_ADMIN, ResourceKind::MailboxAliases).await, 0);
}

// ---------------------------------------------------------------------------
// Creation failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_creation_releases_the_reservation() {
    let fx = fixture().await;
    // Local recipient that does not exist.
    let report = fx
        .importer()
        .run(&DOMAIN_ADMIN, b"alias; team@test.com; true; ghost@test.com\n")
        .await
        .unwrap();
    assert_eq!(
        report.rows[0].message.as_deref(),
        Some("Mailbox ghost@test.com not found")
    );
    assert_eq!(fx.current(&DOMAIN_ADMIN, ResourceKind::MailboxAliases).await, 0);
}

#[tokio::test]
async fn test_existing_entity_fails_and_keeps_counter() {
    let fx = fixture().await;
    let source = b"domain; a.com; 10; true\n";
    fx.importer().run(&RESELLER, source).await.unwrap();
    fx.registry
        .set_max(RESELLER.id, ResourceKind::Domains, 5)
        .await
        .unwrap();

    let report = fx.importer().run(&RESELLER, source).await.unwrap();
    assert_eq!(
        report.rows[0].message.as_deref(),
        Some("Domain a.com already exists")
    );
    assert_eq!(report.status, ImportStatus::Failed);
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 1);
}

#[tokio::test]
async fn test_continue_if_exists_skips_existing_entities() {
    let fx = fixture().await;
    fx.registry
        .set_max(RESELLER.id, ResourceKind::Domains, 5)
        .await
        .unwrap();
    fx.importer()
        .run(&RESELLER, b"domain; a.com; 10; true\n")
        .await
        .unwrap();

    let importer = Importer::new(&fx.registry, &fx.directory).with_options(ImportOptions {
        continue_if_exists: true,
        ..hashed_passwords()
    });
    let report = importer
        .run(&RESELLER, b"domain; a.com; 10; true\ndomain; b.com; 10; true\n")
        .await
        .unwrap();
    assert_eq!(report.status, ImportStatus::Completed);
    assert_eq!(report.summary(), "1 created, 1 skipped, 0 failed");
    assert_eq!(report.rows[0].status, RowStatus::Skipped);
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 2);
}

// ---------------------------------------------------------------------------
// Input handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_malformed_rows_are_reported_and_skipped_over() {
    let fx = fixture().await;
    let source = b"domain; a.com; lots; true\n\
                   \n\
                   mailbox; x@test.com\n\
                   domain; b.com; 10; true\n";
    let report = fx.importer().run(&RESELLER, source).await.unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.rows[0].line, 1);
    assert_eq!(report.rows[0].kind, Some(RowKind::Domain));
    assert_matches!(report.rows[0].failure, Some(RowFailure::InvalidRow(_)));
    assert_eq!(report.rows[1].line, 3);
    assert_eq!(report.rows[1].kind, None);
    assert_eq!(report.rows[2].status, RowStatus::Created);
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 1);
}

#[tokio::test]
async fn test_custom_separator_and_crlf() {
    let fx = fixture().await;
    let importer = Importer::new(&fx.registry, &fx.directory).with_options(ImportOptions {
        separator: ',',
        ..hashed_passwords()
    });
    let report = importer
        .run(&RESELLER, b"domain, a.com, 10, yes\r\ndomain, b.com, 10, no\r\n")
        .await
        .unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(fx.directory.is_domain_enabled("b.com").await, Some(false));
}

#[tokio::test]
async fn test_binary_input_is_fatal() {
    let fx = fixture().await;
    let result = fx
        .importer()
        .run(&RESELLER, b"domain; a.com\0; 10; true\n")
        .await;
    assert_matches!(result, Err(CoreError::Validation(_)));
    assert_eq!(fx.current(&RESELLER, ResourceKind::Domains).await, 0);
}

#[tokio::test]
async fn test_latin1_file_is_accepted() {
    let fx = fixture().await;
    // "René" in ISO-8859-1.
    let mut source = b"account; rene@test.com; toto; Ren".to_vec();
    source.push(0xE9);
    source.extend_from_slice(b"; Truc; True; SimpleUsers; rene@test.com; 5\n");
    let report = fx.importer().run(&DOMAIN_ADMIN, &source).await.unwrap();
    assert_eq!(report.created, 1, "{:?}", report.rows);
}

#[tokio::test]
async fn test_empty_file_completes_with_nothing_done() {
    let fx = fixture().await;
    let report = fx.importer().run(&RESELLER, b"\n  \n").await.unwrap();
    assert_eq!(report.status, ImportStatus::Completed);
    assert_eq!(report.total(), 0);
}

#[tokio::test]
async fn test_cleartext_passwords_are_hashed_before_storage() {
    let fx = fixture().await;
    let importer = Importer::new(&fx.registry, &fx.directory);
    assert!(importer.options().crypt_passwords);

    let report = importer
        .run(
            &DOMAIN_ADMIN,
            b"account; user1@test.com; s3cret; User; One; True; SimpleUsers; user1@test.com; 5\n",
        )
        .await
        .unwrap();
    assert_eq!(report.created, 1, "{:?}", report.rows);

    let hash = fx.directory.password_hash("user1@test.com").await.unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(password::opens(&hash, "s3cret"));
}
