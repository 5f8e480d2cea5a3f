//! Per-row outcomes and the aggregate import report.

use serde::Serialize;

use super::row::RowKind;
use crate::limits::ResourceKind;

/// Why a single row was not imported. `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowFailure {
    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Permission denied: {0}")]
    PermissionDeniedWith(String),

    #[error("{}: limit reached", .0.label())]
    LimitReached(ResourceKind),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Rejected(String),

    #[error("internal error")]
    Internal,
}

/// What happened to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Created,
    Skipped,
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one non-blank input line.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Row kind, when the tag could be read.
    pub kind: Option<RowKind>,
    pub status: RowStatus,
    /// User-facing reason for skipped and failed rows.
    pub message: Option<String>,
    #[serde(skip)]
    pub failure: Option<RowFailure>,
}

impl RowOutcome {
    pub fn created(line: usize, kind: RowKind) -> Self {
        Self {
            line,
            kind: Some(kind),
            status: RowStatus::Created,
            message: None,
            failure: None,
        }
    }

    pub fn skipped(line: usize, kind: RowKind, message: String) -> Self {
        Self {
            line,
            kind: Some(kind),
            status: RowStatus::Skipped,
            message: Some(message),
            failure: None,
        }
    }

    pub fn failed(line: usize, kind: Option<RowKind>, failure: RowFailure) -> Self {
        Self {
            line,
            kind,
            status: RowStatus::Failed,
            message: Some(failure.to_string()),
            failure: Some(failure),
        }
    }
}

/// Overall status of an import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// No row failed (includes empty files).
    Completed,
    /// Some rows failed, others went through.
    Partial,
    /// Every row failed.
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate result of one import call, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows: Vec<RowOutcome>,
}

impl Default for ImportReport {
    fn default() -> Self {
        Self {
            status: ImportStatus::Completed,
            created: 0,
            skipped: 0,
            failed: 0,
            rows: Vec::new(),
        }
    }
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and refresh totals and status.
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome.status {
            RowStatus::Created => self.created += 1,
            RowStatus::Skipped => self.skipped += 1,
            RowStatus::Failed => self.failed += 1,
        }
        self.rows.push(outcome);
        self.status = if self.failed == 0 {
            ImportStatus::Completed
        } else if self.created + self.skipped == 0 {
            ImportStatus::Failed
        } else {
            ImportStatus::Partial
        };
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Failed rows, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.rows
            .iter()
            .filter(|row| row.status == RowStatus::Failed)
    }

    /// `true` if any row message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.rows
            .iter()
            .filter_map(|row| row.message.as_deref())
            .any(|message| message.contains(needle))
    }

    /// One-line banner, e.g. `2 created, 0 skipped, 1 failed`.
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} skipped, {} failed",
            self.created, self.skipped, self.failed
        )
    }
}
