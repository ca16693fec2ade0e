//! CFFOLDER parser.
//!
//! A folder ("volume") is the cabinet's unit of compression: one contiguous
//! uncompressed address space, split into data blocks that share dictionary
//! state. Compression decisions are made per folder, not per block.

use std::io::Read;

use crate::error::{CabError, Result};

use super::{CabinetHeader, LeCursor};

/// Compression scheme of one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// Data blocks are stored verbatim.
    None,
    /// Each block is a DEFLATE stream framed with a 2-byte "CK" marker.
    MsZip,
    /// LZX with the given window size exponent (15..=21).
    Lzx { window_bits: u8 },
}

impl CompressionType {
    const TYPE_MASK: u16 = 0x000F;
    const TYPE_NONE: u16 = 0x0000;
    const TYPE_MSZIP: u16 = 0x0001;
    const TYPE_LZX: u16 = 0x0003;

    /// Decode the raw `typeCompress` field.
    ///
    /// Quantum and unknown types are rejected here so that an unsupported
    /// folder aborts cabinet construction, not a later extraction call.
    pub fn from_raw(raw: u16) -> Result<Self> {
        match raw & Self::TYPE_MASK {
            Self::TYPE_NONE => Ok(Self::None),
            Self::TYPE_MSZIP => Ok(Self::MsZip),
            Self::TYPE_LZX => {
                let window_bits = ((raw >> 8) & 0x1F) as u8;
                if !(15..=21).contains(&window_bits) {
                    return Err(CabError::UnsupportedWindowSize(window_bits));
                }
                Ok(Self::Lzx { window_bits })
            }
            _ => Err(CabError::UnsupportedCompression(raw)),
        }
    }
}

/// Parsed CFFOLDER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Absolute offset of the folder's first CFDATA header.
    pub data_offset: u32,
    /// Number of CFDATA blocks in the folder.
    pub block_count: u16,
    pub compression: CompressionType,
    /// Per-folder reserved bytes (size from CFHEADER).
    pub reserve_data: Vec<u8>,
}

impl Folder {
    /// Parse one CFFOLDER record.
    pub fn read<R: Read>(reader: &mut R, header: &CabinetHeader) -> Result<Self> {
        let mut fixed = [0u8; 8];
        reader.read_exact(&mut fixed)?;
        let mut c = LeCursor::new(&fixed);
        let data_offset = c.u32();
        let block_count = c.u16();
        let compression = CompressionType::from_raw(c.u16())?;

        let mut reserve_data = vec![0u8; header.folder_reserve as usize];
        reader.read_exact(&mut reserve_data)?;

        Ok(Self {
            data_offset,
            block_count,
            compression,
            reserve_data,
        })
    }
}
