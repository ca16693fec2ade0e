//! CFHEADER parser.
//!
//! The cabinet header sits at offset 0 and describes the whole container:
//! signature, total size, folder/file counts, flags and optional reserved
//! areas.

use std::io::Read;

use crate::error::{CabError, Result};

use super::LeCursor;

/// Cabinet signature: `MSCF`.
pub const SIGNATURE: &[u8; 4] = b"MSCF";

/// Maximum value of `cbCFHeader` permitted by the format.
const MAX_HEADER_RESERVE: u16 = 60_000;

/// CFHEADER flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CabinetFlags(pub u16);

impl CabinetFlags {
    pub const PREV_CABINET: u16 = 0x0001;
    pub const NEXT_CABINET: u16 = 0x0002;
    pub const RESERVE_PRESENT: u16 = 0x0004;

    pub fn has_previous(self) -> bool {
        self.0 & Self::PREV_CABINET != 0
    }

    pub fn has_next(self) -> bool {
        self.0 & Self::NEXT_CABINET != 0
    }

    pub fn has_reserve(self) -> bool {
        self.0 & Self::RESERVE_PRESENT != 0
    }
}

/// Parsed CFHEADER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetHeader {
    /// Total size of the cabinet file in bytes.
    pub total_size: u32,
    /// Absolute offset of the first CFFILE record.
    pub file_table_offset: u32,
    pub version_minor: u8,
    pub version_major: u8,
    /// Number of CFFOLDER records.
    pub folder_count: u16,
    /// Number of CFFILE records.
    pub file_count: u16,
    pub flags: CabinetFlags,
    pub set_id: u16,
    pub set_index: u16,
    /// Per-folder reserved bytes appended to each CFFOLDER.
    pub folder_reserve: u8,
    /// Per-block reserved bytes appended to each CFDATA header.
    pub data_reserve: u8,
    /// Application-specific blob following the header.
    pub reserve_data: Vec<u8>,
}

impl CabinetHeader {
    /// Parse a CFHEADER from the start of `reader`.
    ///
    /// Fails fast on a bad signature, on spanned-cabinet flags and on an
    /// out-of-range reserve size.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        if &signature != SIGNATURE {
            return Err(CabError::InvalidSignature);
        }

        let mut fixed = [0u8; 32];
        reader.read_exact(&mut fixed)?;
        let mut c = LeCursor::new(&fixed);
        let _reserved1 = c.u32();
        let total_size = c.u32();
        let _reserved2 = c.u32();
        let file_table_offset = c.u32();
        let _reserved3 = c.u32();
        let version_minor = c.u8();
        let version_major = c.u8();
        let folder_count = c.u16();
        let file_count = c.u16();
        let flags = CabinetFlags(c.u16());
        let set_id = c.u16();
        let set_index = c.u16();

        if flags.has_previous() || flags.has_next() {
            return Err(CabError::SpannedCabinet);
        }

        let (header_reserve, folder_reserve, data_reserve) = if flags.has_reserve() {
            let mut sizes = [0u8; 4];
            reader.read_exact(&mut sizes)?;
            let header = u16::from_le_bytes([sizes[0], sizes[1]]);
            if header > MAX_HEADER_RESERVE {
                return Err(CabError::InvalidHeader);
            }
            (header, sizes[2], sizes[3])
        } else {
            (0, 0, 0)
        };

        let mut reserve_data = vec![0u8; header_reserve as usize];
        reader.read_exact(&mut reserve_data)?;

        Ok(Self {
            total_size,
            file_table_offset,
            version_minor,
            version_major,
            folder_count,
            file_count,
            flags,
            set_id,
            set_index,
            folder_reserve,
            data_reserve,
            reserve_data,
        })
    }
}
