//! CFDATA header parser.
//!
//! Each data block is an 8-byte header (checksum + sizes), optional reserved
//! bytes, then the compressed payload. The checksum is recorded but not
//! verified.

use std::io::Read;

use crate::error::Result;

use super::{CabinetHeader, LeCursor};

/// Parsed CFDATA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub checksum: u32,
    /// Compressed payload size in bytes.
    pub compressed_size: u16,
    /// Uncompressed size this block contributes to the folder.
    pub uncompressed_size: u16,
}

impl DataHeader {
    /// Parse one CFDATA header, consuming any per-block reserved bytes.
    ///
    /// The reader is left positioned at the first payload byte.
    pub fn read<R: Read>(reader: &mut R, header: &CabinetHeader) -> Result<Self> {
        let mut fixed = [0u8; 8];
        reader.read_exact(&mut fixed)?;
        let mut c = LeCursor::new(&fixed);
        let checksum = c.u32();
        let compressed_size = c.u16();
        let uncompressed_size = c.u16();

        if header.data_reserve > 0 {
            let mut reserve = vec![0u8; header.data_reserve as usize];
            reader.read_exact(&mut reserve)?;
        }

        Ok(Self {
            checksum,
            compressed_size,
            uncompressed_size,
        })
    }
}
