//! Error types for cabinet parsing and extraction.
//!
//! This module provides the [`CabError`] type which covers all possible errors
//! that can occur when opening a cabinet or extracting files from it.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Format | [`InvalidSignature`], [`InvalidHeader`], [`FileTableOffset`] | File is not a valid cabinet |
//! | Unsupported | [`SpannedCabinet`], [`UnsupportedCompression`], [`UnsupportedWindowSize`] | Valid cabinet, feature out of scope |
//! | Decode | [`Decompress`] | A data block failed to decompress |
//! | I/O | [`Io`] | Read/write errors |
//!
//! [`InvalidSignature`]: CabError::InvalidSignature
//! [`InvalidHeader`]: CabError::InvalidHeader
//! [`FileTableOffset`]: CabError::FileTableOffset
//! [`SpannedCabinet`]: CabError::SpannedCabinet
//! [`UnsupportedCompression`]: CabError::UnsupportedCompression
//! [`UnsupportedWindowSize`]: CabError::UnsupportedWindowSize
//! [`Decompress`]: CabError::Decompress
//! [`Io`]: CabError::Io

use std::fmt;
use std::io;

use crate::decompress::DecompressError;

/// Error type for cabinet operations.
///
/// Covers container-level faults discovered at open time as well as decode
/// faults surfaced during extraction. Implements [`std::error::Error`] for
/// integration with the Rust error handling ecosystem.
#[derive(Debug)]
pub enum CabError {
    /// The file does not start with the `MSCF` cabinet signature.
    InvalidSignature,

    /// A header record is malformed or truncated.
    ///
    /// This usually indicates file corruption or an incomplete download.
    InvalidHeader,

    /// The CFFILE table does not start at the offset the header declares.
    ///
    /// All metadata is laid out back-to-back; a mismatch means the folder
    /// records and the header disagree and nothing after them can be trusted.
    FileTableOffset {
        /// Offset declared in CFHEADER.
        declared: u64,
        /// Offset actually reached after the folder records.
        actual: u64,
    },

    /// The cabinet is part of a multi-cabinet set (PREV/NEXT flags set).
    ///
    /// Spanned cabinets are not supported; each part references folders that
    /// continue in sibling files.
    SpannedCabinet,

    /// A folder declares a compression type this crate does not decode.
    ///
    /// The `u16` is the raw `typeCompress` field. Quantum (`0x0002`) falls
    /// here, as does any unknown value.
    UnsupportedCompression(u16),

    /// An LZX folder declares a window size outside the valid 15..=21 range.
    UnsupportedWindowSize(u8),

    /// No file with the requested name exists in the cabinet.
    ///
    /// Lookup is case-insensitive against the stored names.
    FileNotFound(String),

    /// A data block failed to decompress.
    ///
    /// The owning [`Cabinet`](crate::Cabinet) should be discarded; the
    /// position of its underlying stream is unspecified after this error.
    Decompress(DecompressError),

    /// An I/O error occurred.
    Io(io::Error),
}

impl fmt::Display for CabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "Invalid cabinet signature"),
            Self::InvalidHeader => write!(f, "Invalid or malformed header"),
            Self::FileTableOffset { declared, actual } => {
                write!(
                    f,
                    "File table offset mismatch: header declares {}, folder records end at {}",
                    declared, actual
                )
            }
            Self::SpannedCabinet => write!(f, "Multi-part (spanned) cabinets are not supported"),
            Self::UnsupportedCompression(t) => {
                write!(f, "Unsupported compression type: 0x{:04x}", t)
            }
            Self::UnsupportedWindowSize(w) => {
                write!(f, "LZX window size out of range: {} (valid: 15..=21)", w)
            }
            Self::FileNotFound(name) => write!(f, "File not found in cabinet: {}", name),
            Self::Decompress(e) => write!(f, "Decompression failed: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CabError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decompress(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CabError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DecompressError> for CabError {
    fn from(e: DecompressError) -> Self {
        Self::Decompress(e)
    }
}

pub type Result<T> = std::result::Result<T, CabError>;
