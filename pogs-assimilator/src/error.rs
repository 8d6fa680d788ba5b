//! Error types for pogs-assimilator
//!
//! Two layers:
//! - [`DecodeError`] comes out of the decoder. Format and unknown-parameter
//!   errors reject one block; I/O errors end the file.
//! - [`AssimilationError`] is what a task reports to its caller. Every variant
//!   carries the task id, and the point name where one is known.

use std::path::PathBuf;
use thiserror::Error;

/// Why a line did not match its expected shape
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatErrorKind {
    #[error("marker line carries no point name")]
    MissingPointName,

    #[error("filter name line lists no filters")]
    NoFilters,

    #[error("{field}: expected {expected} values, found {found}")]
    FieldCount {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{field}: '{token}' is not a number")]
    NotANumber { field: &'static str, token: String },

    #[error("{field}: '{token}' is not a finite number")]
    NotFinite { field: &'static str, token: String },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("block ended before {missing}")]
    Truncated { missing: &'static str },

    #[error("expected {expected}, found a marker line")]
    UnexpectedMarker { expected: &'static str },

    #[error("parameter name line carries no name")]
    EmptyParameterName,

    #[error("percentile marker outside a parameter block")]
    OrphanPercentiles,

    #[error("parameter '{name}' has more than one percentile set")]
    DuplicatePercentiles { name: String },

    #[error("parameter '{name}' has no percentile set")]
    MissingPercentiles { name: String },
}

/// Decoder failure, tagged with block and line
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed line; the enclosing block is discarded
    #[error(
        "format error in block {} at line {line}: {kind}",
        block_label(.point_name)
    )]
    Format {
        point_name: Option<String>,
        line: usize,
        kind: FormatErrorKind,
    },

    /// Parameter name outside the catalog; the enclosing block is discarded
    #[error("unknown parameter '{name}' in block {point_name} at line {line}")]
    UnknownParameter {
        point_name: String,
        line: usize,
        name: String,
    },

    /// The line source failed; nothing after this line can be decoded
    #[error("I/O error reading report at line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    pub fn point_name(&self) -> Option<&str> {
        match self {
            DecodeError::Format { point_name, .. } => point_name.as_deref(),
            DecodeError::UnknownParameter { point_name, .. } => Some(point_name),
            DecodeError::Io { .. } => None,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            DecodeError::Format { line, .. }
            | DecodeError::UnknownParameter { line, .. }
            | DecodeError::Io { line, .. } => *line,
        }
    }
}

fn block_label(point_name: &Option<String>) -> &str {
    point_name.as_deref().unwrap_or("<unnamed>")
}

fn point_suffix(point_name: &Option<String>) -> String {
    point_name
        .as_ref()
        .map(|p| format!(" for point {}", p))
        .unwrap_or_default()
}

/// Task-level failure surfaced to the orchestrator's caller
#[derive(Debug, Error)]
pub enum AssimilationError {
    /// No output artifact could be resolved; nothing was committed
    #[error("task {task_id}: no output artifact ({reason})")]
    MissingOutput { task_id: String, reason: String },

    /// Store write failed; the file's transaction was rolled back
    #[error(
        "task {task_id}: persistence failed{}: {source}",
        point_suffix(.point_name)
    )]
    Persistence {
        task_id: String,
        point_name: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    /// The artifact could not be read; the file's transaction was rolled back
    #[error("task {task_id}: cannot read {}: {source}", .path.display())]
    Io {
        task_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The task collaborator failed to answer
    #[error("task {task_id}: task source failed: {source}")]
    TaskSource {
        task_id: String,
        #[source]
        source: pogs_common::Error,
    },

    /// Cancellation was requested before the task started
    #[error("task {task_id}: cancelled before start")]
    Cancelled { task_id: String },
}

impl AssimilationError {
    pub fn task_id(&self) -> &str {
        match self {
            AssimilationError::MissingOutput { task_id, .. }
            | AssimilationError::Persistence { task_id, .. }
            | AssimilationError::Io { task_id, .. }
            | AssimilationError::TaskSource { task_id, .. }
            | AssimilationError::Cancelled { task_id } => task_id,
        }
    }

    pub fn point_name(&self) -> Option<&str> {
        match self {
            AssimilationError::Persistence { point_name, .. } => point_name.as_deref(),
            _ => None,
        }
    }
}
