//! Huffman decoder for LZX symbol trees.
//!
//! LZX uses canonical Huffman codes with lengths up to 16 bits. Codes no
//! longer than the table width decode with a single lookup; longer codes
//! continue through tree nodes chained past the direct region.

use super::{BitReader, DecompressError, Result};

/// Maximum code length in bits.
pub const MAX_CODE_LENGTH: u32 = 16;

/// Marks an unused table entry / unfilled tree slot.
const EMPTY_SLOT: u16 = 0xFFFF;

/// Huffman decoding table for one symbol alphabet.
///
/// Holds the per-symbol code lengths between blocks; LZX retransmits trees
/// as deltas against the previous lengths, so callers mutate
/// [`lengths_mut`](Self::lengths_mut) and then [`rebuild`](Self::rebuild).
pub struct HuffmanTable {
    nsyms: usize,
    table_bits: u32,
    lengths: Vec<u8>,
    /// Direct-lookup region of `1 << table_bits` entries, then tree nodes.
    table: Vec<u16>,
}

impl HuffmanTable {
    /// Create an empty table for `nsyms` symbols with a direct-lookup region
    /// of `1 << table_bits` entries.
    pub fn new(nsyms: usize, table_bits: u32) -> Self {
        debug_assert!(table_bits <= MAX_CODE_LENGTH);
        Self {
            nsyms,
            table_bits,
            lengths: vec![0; nsyms],
            table: vec![0; (1 << table_bits) + nsyms * 2],
        }
    }

    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    pub fn lengths_mut(&mut self) -> &mut [u8] {
        &mut self.lengths
    }

    /// Rebuild the decode table from the current code lengths.
    ///
    /// Fails if the lengths over- or under-subscribe the code space. A table
    /// with no nonzero lengths is a degenerate success: it builds, but any
    /// decode against it fails.
    pub fn rebuild(&mut self) -> Result<()> {
        let table_mask: u32 = 1 << self.table_bits;
        let mut pos: u32 = 0;
        let mut bit_mask: u32 = table_mask >> 1;
        // Tree node values must be >= nsyms so decode can tell them from
        // symbols.
        let mut next_symbol = (table_mask >> 1).max(self.nsyms as u32);

        // Codes short enough for the direct region: each fills a run of
        // entries sharing its prefix.
        for bit_num in 1..=self.table_bits {
            for sym in 0..self.nsyms {
                if self.lengths[sym] as u32 == bit_num {
                    let leaf = pos;
                    pos += bit_mask;
                    if pos > table_mask {
                        return Err(DecompressError::InvalidHuffmanCode);
                    }
                    for fill in 0..bit_mask {
                        self.table[(leaf + fill) as usize] = sym as u16;
                    }
                }
            }
            bit_mask >>= 1;
        }

        if pos == table_mask {
            return Ok(());
        }

        for entry in pos..table_mask {
            self.table[entry as usize] = EMPTY_SLOT;
        }

        // Longer codes: grow a binary tree out of the unfilled entries.
        let mut pos = pos << 16;
        let table_mask = table_mask << 16;
        let mut bit_mask: u32 = 1 << 15;
        for bit_num in (self.table_bits + 1)..=MAX_CODE_LENGTH {
            for sym in 0..self.nsyms {
                if self.lengths[sym] as u32 == bit_num {
                    let mut leaf = pos >> 16;
                    for fill in 0..(bit_num - self.table_bits) {
                        if self.table[leaf as usize] == EMPTY_SLOT {
                            if (next_symbol << 1) as usize + 1 >= self.table.len() {
                                return Err(DecompressError::InvalidHuffmanCode);
                            }
                            self.table[(next_symbol << 1) as usize] = EMPTY_SLOT;
                            self.table[(next_symbol << 1) as usize + 1] = EMPTY_SLOT;
                            self.table[leaf as usize] = next_symbol as u16;
                            next_symbol += 1;
                        }
                        leaf = u32::from(self.table[leaf as usize]) << 1;
                        if (pos >> (15 - fill)) & 1 != 0 {
                            leaf += 1;
                        }
                    }
                    self.table[leaf as usize] = sym as u16;
                    pos += bit_mask;
                    if pos > table_mask {
                        return Err(DecompressError::InvalidHuffmanCode);
                    }
                }
            }
            bit_mask >>= 1;
        }

        if pos == table_mask {
            return Ok(());
        }

        // Under-subscribed: only acceptable when the tree is entirely empty.
        if self.lengths.iter().all(|&len| len == 0) {
            Ok(())
        } else {
            Err(DecompressError::InvalidHuffmanCode)
        }
    }

    /// Decode one symbol from the bit stream.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u16> {
        reader.ensure(16);
        let mut entry = self.table[reader.peek(self.table_bits) as usize];

        if entry as usize >= self.nsyms {
            // Long code: walk the tree one bit at a time past the direct
            // region.
            let mut depth = self.table_bits;
            loop {
                if depth >= MAX_CODE_LENGTH {
                    return Err(DecompressError::InvalidHuffmanCode);
                }
                depth += 1;
                let bit = reader.peek(depth) & 1;
                let index = ((u32::from(entry) << 1) | bit) as usize;
                entry = *self
                    .table
                    .get(index)
                    .ok_or(DecompressError::InvalidHuffmanCode)?;
                if (entry as usize) < self.nsyms {
                    break;
                }
            }
        }

        reader.remove(u32::from(self.lengths[entry as usize]));
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_symbol_table() {
        let mut table = HuffmanTable::new(2, 4);
        table.lengths_mut().copy_from_slice(&[1, 1]);
        table.rebuild().unwrap();

        // Canonical: symbol 0 = code 0, symbol 1 = code 1. Stream word
        // 0x8000 starts with bit 1.
        let data = [0x00, 0x80];
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 1);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_varying_lengths() {
        // Symbol 0: len 1 (code 0), symbols 1/2: len 2 (codes 10, 11).
        let mut table = HuffmanTable::new(3, 4);
        table.lengths_mut().copy_from_slice(&[1, 2, 2]);
        table.rebuild().unwrap();

        // Bits: 0, 10, 11 -> 01011... as a 16-bit word = 0x5800.
        let data = [0x00, 0x58];
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 1);
        assert_eq!(table.decode(&mut reader).unwrap(), 2);
    }

    #[test]
    fn test_code_longer_than_table_bits() {
        // With a 2-bit direct region, the length-4 codes decode through tree
        // nodes: lengths [1,2,3,4,4] form a complete canonical set.
        let mut table = HuffmanTable::new(5, 2);
        table.lengths_mut().copy_from_slice(&[1, 2, 3, 4, 4]);
        table.rebuild().unwrap();

        // Codes: 0=0, 1=10, 2=110, 3=1110, 4=1111.
        // Stream: 1111 1110 0 -> 0xFE00 word.
        let data = [0x00, 0xFE];
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 4);
        assert_eq!(table.decode(&mut reader).unwrap(), 3);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_all_zero_lengths_is_degenerate_success() {
        let mut table = HuffmanTable::new(8, 7);
        table.rebuild().unwrap();

        // Building succeeds; decoding against the empty table fails.
        let data = [0xAB, 0xCD];
        let mut reader = BitReader::new(&data);
        assert!(table.decode(&mut reader).is_err());
    }

    #[test]
    fn test_oversubscribed_lengths_rejected() {
        let mut table = HuffmanTable::new(3, 4);
        table.lengths_mut().copy_from_slice(&[1, 1, 1]);
        assert!(table.rebuild().is_err());
    }

    #[test]
    fn test_incomplete_lengths_rejected() {
        // One symbol of length 2 leaves three quarters of the code space
        // unassigned.
        let mut table = HuffmanTable::new(3, 4);
        table.lengths_mut().copy_from_slice(&[2, 0, 0]);
        assert!(table.rebuild().is_err());
    }
}
