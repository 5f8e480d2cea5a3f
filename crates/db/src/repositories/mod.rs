//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async functions that
//! take `&PgPool`, or an open transaction for writes that must commit
//! together.

pub mod alias_repo;
pub mod domain_alias_repo;
pub mod domain_repo;
pub mod limit_repo;
pub mod mailbox_repo;
pub mod user_repo;

pub use alias_repo::AliasRepo;
pub use domain_alias_repo::DomainAliasRepo;
pub use domain_repo::DomainRepo;
pub use limit_repo::LimitRepo;
pub use mailbox_repo::MailboxRepo;
pub use user_repo::UserRepo;
