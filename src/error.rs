//! Error types for the doc2md library.
//!
//! Every failure is funnelled through [`Doc2MdError`], which classifies
//! itself into one of four [`ErrorKind`]s via [`Doc2MdError::kind`]:
//!
//! * `InputError`    — the request itself is unusable (bad location, unknown option).
//! * `ParseError`    — the parser rejected the source bytes.
//! * `StorageError`  — fetching the source or delivering an artefact failed.
//! * `InternalError` — a contract between pipeline stages was broken.
//!
//! The orchestrator never returns these as `Err`; it folds them into an
//! [`ErrorInfo`] stored on the failed [`crate::output::ProcessingReport`].

use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All errors produced by the doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The invocation payload could not be decoded or is missing fields.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A source/output location failed validation.
    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Options builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Parse errors ──────────────────────────────────────────────────────
    #[error(transparent)]
    Parse(#[from] ParseError),

    // ── Storage errors ────────────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] StorageError),

    // ── Internal errors ───────────────────────────────────────────────────
    /// The parser produced a structurally invalid document.
    #[error("Malformed document: {0}")]
    MalformedDocument(#[from] DocumentError),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(String),

    /// A report or metadata artefact could not be serialised.
    #[error("Serialisation failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stages were driven out of order.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    /// Classify this error for the result envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidLocation { .. }
            | Self::InvalidConfig(_)
            | Self::Storage(StorageError::TooLarge { .. }) => ErrorKind::InputError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::MalformedDocument(_)
            | Self::TaskFailed(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Fold into the serialisable form carried by a failed report.
    pub fn to_info(&self, stage: Option<Stage>) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
            stage,
        }
    }
}

/// Failure raised by a [`crate::pipeline::DocumentParser`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The bytes do not start with the `%PDF` magic.
    #[error("Source is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// Header, xref or object stream is unreadable.
    #[error("PDF is corrupt: {0}")]
    Corrupt(String),

    /// The document is encrypted and no password mechanism is supported.
    #[error("PDF is encrypted; decrypt it first (e.g. qpdf --decrypt in.pdf out.pdf)")]
    Encrypted,

    /// The parser refused the document for an engine-specific reason.
    #[error("Parser '{parser}' failed: {detail}")]
    Engine { parser: String, detail: String },
}

/// Failure raised by an [`crate::storage::ObjectStore`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: '{location}'")]
    NotFound { location: String },

    #[error("Access denied for '{location}': {detail}")]
    AccessDenied { location: String, detail: String },

    /// Network or backend hiccup; callers may retry outside the core.
    #[error("Transient storage failure for '{location}': {detail}")]
    Transient { location: String, detail: String },

    #[error("I/O error on '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend cannot accept writes (HTTP sources).
    #[error("Location '{location}' is read-only")]
    ReadOnly { location: String },

    /// No backend is registered for the location scheme.
    #[error("No storage backend for scheme '{scheme}'")]
    Unsupported { scheme: String },

    /// The object is bigger than the caller allowed. Raised before the body
    /// is buffered whenever the backend knows the size up front.
    #[error("Source '{location}' exceeds the {limit}-byte limit")]
    TooLarge { location: String, limit: u64 },
}

impl StorageError {
    /// Map an `io::Error` to the closest storage failure.
    pub fn from_io(location: impl Into<String>, source: std::io::Error) -> Self {
        let location = location.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { location },
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied {
                location,
                detail: source.to_string(),
            },
            _ => Self::Io { location, source },
        }
    }
}

/// A broken [`crate::document::StructuralDocument`] invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("table block {index} has a ragged grid (row {row} has {found} cells, expected {expected})")]
    RaggedTable {
        index: usize,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("table block {index} carries no table data")]
    MissingTableData { index: usize },

    #[error("{kind} block {index} carries table data")]
    UnexpectedTableData { index: usize, kind: String },

    #[error("heading block {index} has level {level} (expected 1-6)")]
    InvalidHeadingLevel { index: usize, level: u8 },
}

/// The four error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InputError,
    ParseError,
    StorageError,
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputError => "InputError",
            Self::ParseError => "ParseError",
            Self::StorageError => "StorageError",
            Self::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}

/// Error detail attached to a failed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    /// Stage that failed; `None` when the request was rejected before any stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(
            Doc2MdError::InvalidRequest("x".into()).kind(),
            ErrorKind::InputError
        );
        assert_eq!(
            Doc2MdError::from(ParseError::Encrypted).kind(),
            ErrorKind::ParseError
        );
        assert_eq!(
            Doc2MdError::from(StorageError::ReadOnly {
                location: "https://a/b.pdf".into()
            })
            .kind(),
            ErrorKind::StorageError
        );
        assert_eq!(
            Doc2MdError::from(StorageError::TooLarge {
                location: "s3://b/big.pdf".into(),
                limit: 10,
            })
            .kind(),
            ErrorKind::InputError
        );
        assert_eq!(
            Doc2MdError::from(DocumentError::MissingTableData { index: 2 }).kind(),
            ErrorKind::InternalError
        );
        assert_eq!(
            Doc2MdError::TaskFailed("panic".into()).kind(),
            ErrorKind::InternalError
        );
    }

    #[test]
    fn transparent_variants_keep_inner_message() {
        let e = Doc2MdError::from(StorageError::NotFound {
            location: "s3://b/k.pdf".into(),
        });
        assert_eq!(e.to_string(), "Object not found: 's3://b/k.pdf'");
    }

    #[test]
    fn io_errors_map_to_storage_classes() {
        let nf = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            StorageError::from_io("a.pdf", nf),
            StorageError::NotFound { .. }
        ));
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            StorageError::from_io("a.pdf", denied),
            StorageError::AccessDenied { .. }
        ));
        let other = std::io::Error::other("disk full");
        assert!(matches!(
            StorageError::from_io("a.pdf", other),
            StorageError::Io { .. }
        ));
    }

    #[test]
    fn error_info_display_prefixes_kind() {
        let info = Doc2MdError::from(ParseError::Corrupt("bad xref".into()))
            .to_info(Some(Stage::Parsing));
        assert_eq!(info.to_string(), "ParseError: PDF is corrupt: bad xref");
        assert_eq!(info.stage, Some(Stage::Parsing));
    }

    #[test]
    fn error_info_serialises_camel_case() {
        let info = Doc2MdError::InvalidConfig("nope".into()).to_info(None);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "InputError");
        assert!(json.get("stage").is_none());
    }

    #[test]
    fn ragged_table_display() {
        let e = DocumentError::RaggedTable {
            index: 3,
            row: 1,
            found: 2,
            expected: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("block 3"), "got: {msg}");
        assert!(msg.contains("expected 4"), "got: {msg}");
    }
}
