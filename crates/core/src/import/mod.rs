//! CSV bulk import of domains, domain aliases, accounts and aliases.

pub mod decode;
pub mod engine;
pub mod report;
pub mod row;

pub use engine::{ImportOptions, Importer};
pub use report::{ImportReport, ImportStatus, RowFailure, RowOutcome, RowStatus};
pub use row::{ImportRow, RowKind};
