//! CFFILE parser.
//!
//! Each file in a cabinet is a reference into a folder: an uncompressed byte
//! offset plus a length, followed by a DOS timestamp, attribute bits and a
//! NUL-terminated name.

use std::io::Read;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{CabError, Result};

use super::{read_cstring, LeCursor};

/// Folder index sentinels used by spanned cabinets. Any of these on a file
/// entry means the data continues in a sibling cabinet.
const FOLDER_CONTINUED_FROM_PREV: u16 = 0xFFFD;

/// CFFILE attribute bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes(pub u16);

impl FileAttributes {
    pub const READ_ONLY: u16 = 0x0001;
    pub const HIDDEN: u16 = 0x0002;
    pub const SYSTEM: u16 = 0x0004;
    pub const ARCHIVE: u16 = 0x0020;
    pub const EXECUTE: u16 = 0x0040;
    pub const NAME_IS_UTF8: u16 = 0x0080;

    pub fn is_read_only(self) -> bool {
        self.0 & Self::READ_ONLY != 0
    }

    pub fn is_hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    pub fn is_system(self) -> bool {
        self.0 & Self::SYSTEM != 0
    }

    pub fn is_archive(self) -> bool {
        self.0 & Self::ARCHIVE != 0
    }

    pub fn name_is_utf8(self) -> bool {
        self.0 & Self::NAME_IS_UTF8 != 0
    }
}

/// DOS-packed date and time, as stored in CFFILE.
///
/// Date: `YYYYYYYM MMMDDDDD` (year since 1980), time: `HHHHHMMM MMMSSSSS`
/// (two-second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    pub fn year(self) -> u16 {
        1980 + (self.date >> 9)
    }

    pub fn month(self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    pub fn day(self) -> u8 {
        (self.date & 0x1F) as u8
    }

    pub fn hour(self) -> u8 {
        (self.time >> 11) as u8
    }

    pub fn minute(self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    pub fn second(self) -> u8 {
        (self.time & 0x1F) as u8 * 2
    }

    /// Convert to a `SystemTime`, treating the stored fields as UTC.
    ///
    /// Out-of-range month/day values clamp to the epoch rather than panic;
    /// cabinets in the wild do carry zeroed timestamps.
    pub fn to_system_time(self) -> SystemTime {
        let year = self.year() as i64;
        let month = self.month() as i64;
        let day = self.day() as i64;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return UNIX_EPOCH;
        }

        let mut days: i64 = 0;
        for y in 1970..year {
            days += if is_leap(y) { 366 } else { 365 };
        }
        const DAYS_BEFORE: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
        days += DAYS_BEFORE[(month - 1) as usize];
        if month > 2 && is_leap(year) {
            days += 1;
        }
        days += day - 1;

        let secs = days * 86_400
            + self.hour() as i64 * 3_600
            + self.minute() as i64 * 60
            + self.second() as i64;
        UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
    }
}

fn is_leap(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Parsed CFFILE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Uncompressed size in bytes.
    pub size: u32,
    /// Offset of the file's first byte within its folder's uncompressed
    /// address space.
    pub folder_offset: u32,
    /// Index of the owning folder.
    pub folder_index: u16,
    pub timestamp: DosDateTime,
    pub attributes: FileAttributes,
    /// Stored name, decoded per the UTF-8 attribute bit. Path separators are
    /// backslashes as written by the packer.
    pub name: String,
}

impl FileEntry {
    /// Parse one CFFILE record, including its trailing name.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 16];
        reader.read_exact(&mut fixed)?;
        let mut c = LeCursor::new(&fixed);
        let size = c.u32();
        let folder_offset = c.u32();
        let folder_index = c.u16();
        let date = c.u16();
        let time = c.u16();
        let attributes = FileAttributes(c.u16());

        if folder_index >= FOLDER_CONTINUED_FROM_PREV {
            return Err(CabError::SpannedCabinet);
        }

        let raw_name = read_cstring(reader)?;
        let name = if attributes.name_is_utf8() {
            String::from_utf8_lossy(&raw_name).into_owned()
        } else {
            // Extended ASCII: a 1:1 byte-to-char mapping.
            raw_name.iter().map(|&b| b as char).collect()
        };

        Ok(Self {
            size,
            folder_offset,
            folder_index,
            timestamp: DosDateTime { date, time },
            attributes,
            name,
        })
    }

    /// Stored name with backslashes normalized to forward slashes.
    pub fn normalized_name(&self) -> String {
        self.name.replace('\\', "/")
    }
}
