//! Error types for JPEG session operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for corruptme operations.
pub type Result<T> = std::result::Result<T, CorruptMeError>;

/// Errors that can occur while opening, editing or closing a JPEG session.
#[derive(Error)]
pub enum CorruptMeError {
    /// The source file is missing or unreadable.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bitstream is malformed or uses an unsupported JPEG feature.
    #[error("invalid JPEG: {reason}")]
    Format { reason: String },

    /// Component index does not exist in the frame.
    #[error("component {component} out of range (image has {count} components)")]
    ComponentOutOfRange { component: usize, count: usize },

    /// Block coordinate lies outside the component's block grid.
    #[error("block ({bx}, {by}) out of range for component {component} with {blocks_x}x{blocks_y} blocks")]
    BlockOutOfRange {
        component: usize,
        bx: usize,
        by: usize,
        blocks_x: usize,
        blocks_y: usize,
    },

    /// A block payload did not hold exactly 64 coefficients.
    #[error("block payload must hold exactly 64 coefficients, got {len}")]
    Shape { len: usize },

    /// The session was already closed.
    #[error("session is closed")]
    UseAfterClose,

    /// The current coefficients cannot be expressed with the scan's Huffman tables.
    #[error("cannot encode coefficients: {reason}")]
    Unencodable { reason: String },

    /// Persisting the re-encoded JPEG failed.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of [`CorruptMeError`] variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Open,
    Format,
    Range,
    Shape,
    UseAfterClose,
    Write,
}

impl CorruptMeError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        CorruptMeError::Format {
            reason: reason.into(),
        }
    }

    pub(crate) fn unencodable(reason: impl Into<String>) -> Self {
        CorruptMeError::Unencodable {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CorruptMeError::Open { .. } => ErrorKind::Open,
            CorruptMeError::Format { .. } => ErrorKind::Format,
            CorruptMeError::ComponentOutOfRange { .. } | CorruptMeError::BlockOutOfRange { .. } => {
                ErrorKind::Range
            }
            CorruptMeError::Shape { .. } => ErrorKind::Shape,
            CorruptMeError::UseAfterClose => ErrorKind::UseAfterClose,
            CorruptMeError::Unencodable { .. } | CorruptMeError::Write { .. } => ErrorKind::Write,
        }
    }
}

impl fmt::Debug for CorruptMeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Display for Debug so unwrap() shows user-friendly messages
        write!(f, "{self}")
    }
}
