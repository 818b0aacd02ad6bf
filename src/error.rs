//! # Error Types
//!
//! Custom error types for the TLM decoder using `thiserror`.
//!
//! [`TlmError`] covers failures that abort an operation. [`ParseWarning`]
//! covers per-frame problems that the parser records and recovers from, so a
//! partially corrupt log still yields everything that could be decoded.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the TLM decoder
#[derive(Debug, Error)]
pub enum TlmError {
    /// A read would run past the end of the byte span
    #[error("read of {width} bytes at offset {offset} exceeds {len}-byte span")]
    OutOfBounds {
        /// Cursor position of the attempted read
        offset: usize,
        /// Requested width in bytes
        width: usize,
        /// Length of the span being read
        len: usize,
    },

    /// Frame layout is unusable (zero or implausible frame sizes)
    #[error("invalid frame layout: {0}")]
    InvalidLayout(String),

    /// The file does not start with a main header frame
    #[error("no main header at offset {offset}: not a TLM log")]
    MissingMainHeader {
        /// Offset of the first frame
        offset: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the TLM decoder
pub type Result<T> = std::result::Result<T, TlmError>;

/// Recoverable condition met while scanning a file
///
/// Warnings never abort a parse. They are returned alongside the decoded
/// records so the caller can judge the quality of the log.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A field read ran past its frame; the frame was skipped
    #[error("frame at offset {frame_offset} skipped: {detail}")]
    OutOfBounds {
        /// Offset of the skipped frame in the file
        frame_offset: usize,
        /// Description of the failed read
        detail: String,
    },

    /// The file ends inside a frame
    #[error("file truncated at offset {offset}: {trailing_bytes} trailing bytes, expected {expected}")]
    TruncatedFile {
        /// Offset where the partial frame starts
        offset: usize,
        /// Bytes present after the last complete frame
        trailing_bytes: usize,
        /// Bytes the partial frame would need
        expected: usize,
    },

    /// A data frame carries a type tag with no registered codec
    #[error("unknown sensor type 0x{sensor_type:02X} at offset {offset}")]
    UnknownSensorType {
        /// Offset of the data frame
        offset: usize,
        /// The unrecognized tag
        sensor_type: u8,
    },

    /// A data frame's sensor was never declared by a supplemental header
    #[error("sensor type 0x{sensor_type:02X} not declared in session {session_id}")]
    UndeclaredSensor {
        /// Session the frame belongs to
        session_id: u32,
        /// The undeclared tag
        sensor_type: u8,
    },
}
