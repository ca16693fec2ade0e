//! Cabinet record parsing modules.
//!
//! One module per on-disk record type: CFHEADER, CFFOLDER, CFFILE, CFDATA.
//! All fields are decoded explicitly, little-endian, from byte buffers;
//! nothing relies on host struct layout.

pub mod data_header;
pub mod file_entry;
pub mod folder;
pub mod header;

pub use data_header::DataHeader;
pub use file_entry::{DosDateTime, FileAttributes, FileEntry};
pub use folder::{CompressionType, Folder};
pub use header::{CabinetFlags, CabinetHeader};

use std::io::{self, Read};

/// Read a NUL-terminated byte string, excluding the terminator.
pub(crate) fn read_cstring<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 1];
    loop {
        reader.read_exact(&mut buf)?;
        if buf[0] == 0 {
            break;
        }
        out.push(buf[0]);
    }
    Ok(out)
}

/// Little-endian field cursor over a fixed buffer.
///
/// Callers read a whole record into a stack buffer, then pull fields off in
/// declaration order.
pub(crate) struct LeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    pub fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    pub fn u32(&mut self) -> u32 {
        let v = u32::from_le_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]);
        self.pos += 4;
        v
    }
}
