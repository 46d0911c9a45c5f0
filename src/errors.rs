//! Errors that can occur while decoding a PE image.

use std::{io::Error as IOError, path::PathBuf};

/// Error that can occur when reading a value out of a [`ByteOrderView`](crate::ByteOrderView).
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("read of {length} bytes at offset {offset:#x} exceeds view of {available} bytes")]
pub struct ViewError {
    pub offset:    u64,
    pub length:    usize,
    pub available: usize,
}

/// Errors that can occur when decoding a PE image.
///
/// Every variant is fatal to the decode that produced it.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{} is not a valid PE image (signature mismatch: {found:02x?})", display_path(.path))]
    SignatureMismatch { path: Option<PathBuf>, found: [u8; 4] },
    #[error("unknown optional header magic {magic:#06x}, expected 0x010b or 0x020b")]
    UnknownVariant { magic: u16 },
    #[error("reserved field {field} must be zero, was {value:#x}")]
    ReservedFieldViolation { field: &'static str, value: u64 },
    #[error("read of {length} bytes at offset {offset:#x} is out of bounds in {}", display_path(.path))]
    OutOfBounds { offset: u64, length: usize, path: Option<PathBuf> },
    #[error("error reading {length} bytes at offset {offset:#x} in {}: {source}", display_path(.path))]
    Io {
        offset: u64,
        length: usize,
        path:   Option<PathBuf>,
        source: IOError,
    },
    #[error("unable to close {}: {source}", display_path(.path))]
    ResourceRelease { path: Option<PathBuf>, source: IOError },
    #[error("rva {rva:#x} is not contained in any section")]
    UnmappedRva { rva: u32 },
}

impl From<ViewError> for DecodeError {
    fn from(error: ViewError) -> Self {
        DecodeError::OutOfBounds {
            offset: error.offset,
            length: error.length,
            path:   None,
        }
    }
}

impl DecodeError {
    /// Attach a source path to errors that carry one and don't have it yet.
    pub(crate) fn with_path(mut self, source: Option<&std::path::Path>) -> Self {
        match &mut self {
            DecodeError::SignatureMismatch { path, .. }
            | DecodeError::OutOfBounds { path, .. }
            | DecodeError::Io { path, .. }
            | DecodeError::ResourceRelease { path, .. } => {
                if path.is_none() {
                    *path = source.map(|p| p.to_path_buf());
                }
            }
            _ => {}
        }
        self
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<memory>".into(),
    }
}
