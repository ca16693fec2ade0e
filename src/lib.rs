//! # cab-stream
//!
//! Reader for Microsoft Cabinet (.cab) archives with built-in LZX and MSZIP
//! decompression.
//!
//! Cabinets group files into *folders* that compress as one continuous
//! stream, cut into data blocks of at most 32 KiB of output. Opening a
//! cabinet parses all metadata and indexes every block; files are then read
//! by decoding their folder's blocks in order.
//!
//! ```no_run
//! use std::fs::File;
//! use cab_stream::Cabinet;
//!
//! # fn main() -> cab_stream::Result<()> {
//! let mut cabinet = Cabinet::open(File::open("setup.cab")?)?;
//! for entry in cabinet.entries() {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! let data = cabinet.read_file("readme.txt")?;
//! cabinet.extract_all("out", None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Scope
//!
//! Single-cabinet archives only: sets that continue into a previous or next
//! cabinet are rejected at open, as are folders using the obsolete Quantum
//! scheme.

mod cabinet;
mod decompress;
mod error;
mod parsing;

pub use cabinet::Cabinet;
pub use decompress::{BlockDecoder, DecompressError, FrameKind, LzxDecoder, MsZipDecoder};
pub use error::{CabError, Result};
pub use parsing::{
    CabinetFlags, CabinetHeader, CompressionType, DosDateTime, FileAttributes, FileEntry, Folder,
};
