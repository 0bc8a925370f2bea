//! Error types for the batchvault library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchVaultError`] is **fatal**: the batch cannot proceed or its result
//!   cannot be recorded (unknown group, empty group, store commit failure).
//!   Returned as `Err(BatchVaultError)` from the `personalize*` entry points.
//!
//! * [`RenderError`] is **non-fatal**: the watermark could not be applied for
//!   one recipient (corrupt template, unwritable output) but every other
//!   recipient is still attempted. Stored inside
//!   [`crate::model::RecipientOutcome`] and only reflected as a lower
//!   generated count.
//!
//! Cleanup of the transient template is best-effort and is logged, never
//! returned.

use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the batchvault library.
///
/// Per-recipient render failures use [`RenderError`] and are stored in
/// [`crate::model::RecipientOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchVaultError {
    // ── Request errors ────────────────────────────────────────────────────
    /// No group exists with the requested identifier.
    #[error("Group {group_id} not found")]
    GroupNotFound { group_id: i64 },

    /// The group exists but has nobody to render for.
    #[error("No members in group {group_id} to generate documents for.")]
    EmptyGroup { group_id: i64 },

    /// The template file given to the file-based entry point could not be read.
    #[error("Failed to read template '{path}': {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The relational store failed to load or commit.
    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// Could not create or write a scratch/output location on disk.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchVaultError {
    /// HTTP-style status code for the transport layer in front of the pipeline.
    pub fn status_code(&self) -> u16 {
        match self {
            BatchVaultError::GroupNotFound { .. } => 404,
            BatchVaultError::EmptyGroup { .. }
            | BatchVaultError::TemplateRead { .. }
            | BatchVaultError::InvalidConfig(_) => 400,
            BatchVaultError::Persistence(_)
            | BatchVaultError::Storage { .. }
            | BatchVaultError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for BatchVaultError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::GroupNotFound { group_id } => BatchVaultError::GroupNotFound { group_id },
            other => BatchVaultError::Persistence(other),
        }
    }
}

/// A non-fatal error for a single recipient.
///
/// Stored alongside [`crate::model::RecipientOutcome`] when a render fails.
/// The batch continues with the next recipient.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// The template could not be opened or parsed as a PDF.
    #[error("cannot open template: {detail}")]
    Open { detail: String },

    /// The template parsed but has no pages to stamp.
    #[error("template has no pages")]
    NoPages,

    /// Adding the overlay to a page failed.
    #[error("page {page}: cannot add watermark: {detail}")]
    Stamp { page: usize, detail: String },

    /// The stamped document could not be written.
    #[error("cannot save '{path}': {detail}")]
    Save { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_transport_contract() {
        assert_eq!(BatchVaultError::GroupNotFound { group_id: 7 }.status_code(), 404);
        assert_eq!(BatchVaultError::EmptyGroup { group_id: 7 }.status_code(), 400);
        assert_eq!(
            BatchVaultError::Persistence(StoreError::Unavailable("disk full".into())).status_code(),
            500
        );
        assert_eq!(BatchVaultError::InvalidConfig("x".into()).status_code(), 400);
    }

    #[test]
    fn empty_group_display() {
        let e = BatchVaultError::EmptyGroup { group_id: 3 };
        assert!(e.to_string().contains("No members"), "got: {e}");
        assert!(e.to_string().contains('3'));
    }

    #[test]
    fn store_group_not_found_becomes_not_found() {
        let e: BatchVaultError = StoreError::GroupNotFound { group_id: 12 }.into();
        assert!(matches!(e, BatchVaultError::GroupNotFound { group_id: 12 }));
    }

    #[test]
    fn other_store_errors_become_persistence() {
        let e: BatchVaultError = StoreError::MemberNotFound { member_id: 4 }.into();
        assert!(matches!(e, BatchVaultError::Persistence(_)));
        assert!(e.to_string().contains("member 4"), "got: {e}");
    }

    #[test]
    fn render_error_display() {
        let e = RenderError::Stamp {
            page: 2,
            detail: "bad resources".into(),
        };
        assert_eq!(e.to_string(), "page 2: cannot add watermark: bad resources");
    }
}
