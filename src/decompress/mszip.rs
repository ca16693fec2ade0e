//! MSZIP decompression.
//!
//! Each MSZIP data block is a two-byte "CK" signature followed by one raw
//! DEFLATE stream. Streams are independent, but the 32 KiB LZ77 history
//! carries across a folder's blocks: every block after the first is inflated
//! with the previous output preset as its dictionary.

use flate2::{Decompress, FlushDecompress};

use super::{DecompressError, Result};

/// Block signature bytes.
const SIGNATURE: [u8; 2] = *b"CK";

/// DEFLATE window size; also the maximum block output size.
const HISTORY_SIZE: usize = 32768;

/// MSZIP decoder state for one folder.
pub struct MsZipDecoder {
    inflater: Decompress,
    /// Trailing window of decoded folder output, at most [`HISTORY_SIZE`]
    /// bytes.
    history: Vec<u8>,
}

impl MsZipDecoder {
    pub fn new() -> Self {
        Self {
            inflater: Decompress::new(false),
            history: Vec::with_capacity(HISTORY_SIZE),
        }
    }

    /// Decode one data block: exactly `out.len()` bytes from `input`.
    pub fn decompress_block(&mut self, input: &[u8], out: &mut [u8]) -> Result<()> {
        if input.len() < 2 {
            return Err(DecompressError::UnexpectedEof);
        }
        if input[..2] != SIGNATURE {
            return Err(DecompressError::BadBlockSignature([input[0], input[1]]));
        }

        self.inflater.reset(false);
        if !self.history.is_empty() {
            self.inflater
                .set_dictionary(&self.history)
                .map_err(|e| DecompressError::Inflate(e.to_string()))?;
        }

        self.inflater
            .decompress(&input[2..], out, FlushDecompress::Finish)
            .map_err(|e| DecompressError::Inflate(e.to_string()))?;

        let written = self.inflater.total_out() as usize;
        if written != out.len() {
            return Err(DecompressError::IncompleteData);
        }

        self.history.extend_from_slice(out);
        if self.history.len() > HISTORY_SIZE {
            let excess = self.history.len() - HISTORY_SIZE;
            self.history.drain(..excess);
        }
        Ok(())
    }
}

impl Default for MsZipDecoder {
    fn default() -> Self {
        Self::new()
    }
}
