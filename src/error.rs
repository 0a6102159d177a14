//! Error types for TDF decoding.
//!
//! [`TdfError`] classifies every failure the decoders can hit. Only the two
//! missing-modality kinds are recoverable; a [`crate::session::CaptureSession`]
//! keeps building without that modality and reports the error through
//! [`crate::session::CaptureSession::issues`]. Everything else aborts the
//! decode and is surfaced as an [`OpenError`] carrying the file path.
use std::path::PathBuf;
use thiserror::Error;

use crate::directory::BlockKind;

pub type Result<T> = std::result::Result<T, TdfError>;

#[derive(Debug, Error)]
pub enum TdfError {
    /// First 16 bytes do not render to the TDF signature.
    #[error("invalid TDF signature: expected {expected}, found {found}")]
    InvalidFormat { expected: &'static str, found: String },

    #[error("file declares {entries} directory entries; no data to read")]
    EmptyFile { entries: i32 },

    /// Seek or read outside the file. `offset` is signed so a negative block
    /// offset from the directory is reported as written.
    #[error("corrupt file: {needed} byte(s) requested at offset {offset}, file is {file_len} bytes")]
    CorruptFile { offset: i64, needed: u64, file_len: u64 },

    #[error("3D marker data missing{}", format_found(.found))]
    MissingMarkerData { found: Option<i32> },

    #[error("analogue data missing")]
    MissingAnalogueData,

    #[error("unsupported {kind:?} block format {format}")]
    UnsupportedSubVariant { kind: BlockKind, format: i32 },

    #[error("negative {what} ({value}) at offset {offset}")]
    InvalidCount { what: &'static str, value: i32, offset: u64 },

    #[error("{kind:?} block rate must be positive, found {rate}")]
    InvalidRate { kind: BlockKind, rate: i32 },

    /// A visibility segment reaching outside `[0, limit)`.
    #[error("segment {index} of {owner} ({start}+{length}) outside [0, {limit})")]
    SegmentOutOfRange { owner: String, index: usize, start: i32, length: i32, limit: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_found(found: &Option<i32>) -> String {
    match found {
        Some(format) => format!(" (block format {format} not accepted)"),
        None => String::new(),
    }
}

impl TdfError {
    /// `true` for failures that leave the rest of the file decodable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TdfError::MissingMarkerData { .. } | TdfError::MissingAnalogueData)
    }
}

/// A fatal decode failure tied to the file it came from.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: TdfError,
}

impl OpenError {
    pub fn kind(&self) -> &TdfError { &self.source }
}
