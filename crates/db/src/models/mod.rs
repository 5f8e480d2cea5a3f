//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where rows are inserted, a create DTO.

pub mod alias;
pub mod domain;
pub mod domain_alias;
pub mod limit;
pub mod mailbox;
pub mod user;
