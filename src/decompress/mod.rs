//! Cabinet data block decompression.
//!
//! Cabinets compress per folder, not per file: a folder's data blocks share
//! dictionary state, so blocks must be decoded in order, each through the
//! same decoder instance.
//!
//! ## Decoders
//!
//! | Decoder | Scheme | Algorithm |
//! |---------|--------|-----------|
//! | [`LzxDecoder`] | LZX | LZ77 + canonical Huffman, repeated-offset cache, x86 E8 transform |
//! | [`MsZipDecoder`] | MSZIP | DEFLATE per block with chained dictionary |
//!
//! ## Architecture
//!
//! ```text
//! Compressed Block
//!       ↓
//! ┌─────────────┐
//! │ BitReader   │ ← 16-bit-LE-word bit access (LZX only)
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ Huffman     │ ← Decode variable-length symbols
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ LZX / MSZIP │ ← Expand literals and back-references
//! └─────────────┘
//!       ↓
//! Block of folder output (≤ 32 KiB)
//! ```

mod bit_reader;
mod huffman;
mod lzx;
mod mszip;

pub use bit_reader::BitReader;
pub use lzx::{FrameKind, LzxDecoder};
pub use mszip::MsZipDecoder;

use std::fmt;

use crate::parsing::CompressionType;

/// Decompression errors. All are fatal for the block and its folder.
#[derive(Debug)]
pub enum DecompressError {
    /// The compressed stream ended (or overran its declared size beyond the
    /// 2-byte tolerance) before the block was fully decoded.
    UnexpectedEof,
    /// A bit pattern matched no code in the current Huffman table, or a
    /// table's code lengths were inconsistent.
    InvalidHuffmanCode,
    /// An LZX block header carried an unknown block type.
    InvalidBlockType(u8),
    /// A match or run would cross the sliding window boundary.
    WindowOverrun { position: u32, needed: u32 },
    /// An MSZIP block did not start with the "CK" signature.
    BadBlockSignature([u8; 2]),
    /// The DEFLATE stream inside an MSZIP block was invalid.
    Inflate(String),
    /// A block produced less output than its header declared.
    IncompleteData,
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "Unexpected end of compressed data"),
            Self::InvalidHuffmanCode => write!(f, "Invalid Huffman code"),
            Self::InvalidBlockType(t) => write!(f, "Invalid LZX block type: {}", t),
            Self::WindowOverrun { position, needed } => {
                write!(
                    f,
                    "Run of {} bytes at window position {} crosses the window boundary",
                    needed, position
                )
            }
            Self::BadBlockSignature(sig) => {
                write!(
                    f,
                    "Bad MSZIP block signature: {:02x} {:02x} (expected \"CK\")",
                    sig[0], sig[1]
                )
            }
            Self::Inflate(msg) => write!(f, "Inflate error: {}", msg),
            Self::IncompleteData => write!(f, "Block decoded to fewer bytes than declared"),
        }
    }
}

impl std::error::Error for DecompressError {}

pub type Result<T> = std::result::Result<T, DecompressError>;

/// One folder's decoder session.
///
/// Owns the mutable codec state (window, tables, inflater dictionary) that
/// chains across the folder's blocks. Create one per folder and feed it
/// blocks strictly in physical order; it must never be shared across folders.
pub enum BlockDecoder {
    /// Stored folder: blocks are copied through unchanged.
    Store,
    MsZip(MsZipDecoder),
    Lzx(Box<LzxDecoder>),
}

impl BlockDecoder {
    /// Create the decoder session matching a folder's compression type.
    ///
    /// The window size was validated at parse time, so construction here
    /// cannot fail.
    pub fn for_compression(compression: CompressionType) -> Self {
        match compression {
            CompressionType::None => Self::Store,
            CompressionType::MsZip => Self::MsZip(MsZipDecoder::new()),
            CompressionType::Lzx { window_bits } => Self::Lzx(Box::new(LzxDecoder::new(window_bits))),
        }
    }

    /// Decode one data block: exactly `out.len()` bytes from `input`.
    pub fn decompress_block(&mut self, input: &[u8], out: &mut [u8]) -> Result<()> {
        match self {
            Self::Store => {
                if input.len() < out.len() {
                    return Err(DecompressError::IncompleteData);
                }
                out.copy_from_slice(&input[..out.len()]);
                Ok(())
            }
            Self::MsZip(decoder) => decoder.decompress_block(input, out),
            Self::Lzx(decoder) => {
                // The post-frame E8 pass reports a distinct outcome; both
                // variants mean the block decoded fully.
                decoder.decompress_block(input, out).map(|_| ())
            }
        }
    }
}
