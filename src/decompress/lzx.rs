//! LZX decompression.
//!
//! Implements the LZX variant used by cabinet folders: an LZ77 coder with
//! canonical Huffman trees retransmitted per block as deltas, a three-entry
//! repeated-offset cache and an optional x86 CALL-target transform. The
//! window (32 KiB - 2 MiB) persists across a folder's data blocks, so blocks
//! must be fed to one decoder instance in order.

use super::{
    bit_reader::BitReader,
    huffman::HuffmanTable,
    DecompressError, Result,
};

/// Minimum match length.
const MIN_MATCH: u32 = 2;

/// Literal alphabet size; main tree symbols at or above this are matches.
const NUM_CHARS: u32 = 256;

/// Number of pretree symbols (length-delta alphabet).
const PRETREE_NUM_ELEMENTS: usize = 20;

/// Number of aligned-offset tree symbols.
const ALIGNED_NUM_ELEMENTS: usize = 8;

/// Match lengths 0..7 are coded in the main tree; 7 escapes to the length
/// tree.
const NUM_PRIMARY_LENGTHS: u32 = 7;

/// Number of secondary length tree symbols.
const NUM_SECONDARY_LENGTHS: usize = 249;

const PRETREE_TABLEBITS: u32 = 6;
const MAINTREE_TABLEBITS: u32 = 12;
const LENGTH_TABLEBITS: u32 = 12;
const ALIGNED_TABLEBITS: u32 = 7;

/// Main tree capacity: 256 literals + 8 length headers per position slot,
/// sized for the largest window.
const MAINTREE_MAXSYMBOLS: usize = NUM_CHARS as usize + 50 * 8;
const LENGTH_MAXSYMBOLS: usize = NUM_SECONDARY_LENGTHS + 1;

/// E8 processing stops after this many frames.
const MAX_E8_FRAMES: u32 = 32768;

/// Window filler byte.
const WINDOW_FILL: u8 = 0xDC;

/// Extra offset bits per position slot.
const fn slot_extra_bits(slot: usize) -> u32 {
    if slot < 4 {
        0
    } else if slot < 36 {
        (slot as u32) / 2 - 1
    } else {
        17
    }
}

/// Base offset per position slot, derived from the extra-bit widths.
const POSITION_BASE: [u32; 51] = {
    let mut base = [0u32; 51];
    let mut slot = 1;
    while slot < base.len() {
        base[slot] = base[slot - 1] + (1 << slot_extra_bits(slot - 1));
        slot += 1;
    }
    base
};

/// LZX block types (3-bit header field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    /// Pre-init / post-error state; never read from a stream.
    Invalid,
    Verbatim,
    Aligned,
    Uncompressed,
}

impl BlockType {
    fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            1 => Ok(Self::Verbatim),
            2 => Ok(Self::Aligned),
            3 => Ok(Self::Uncompressed),
            other => Err(DecompressError::InvalidBlockType(other as u8)),
        }
    }
}

/// Outcome of one block decode.
///
/// The original Microsoft decoder signals a frame that went through the E8
/// rewrite with a sentinel return distinct from plain success; both mean the
/// output buffer holds the full block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Block decoded; no call-target rewrite ran on this frame.
    Decoded,
    /// Block decoded and the x86 E8 transform rewrote its output in place.
    CallTargetsRewritten,
}

/// LZX decoder state for one folder.
pub struct LzxDecoder {
    /// Sliding window, 2^window_bits bytes.
    window: Vec<u8>,
    window_size: u32,
    /// Window write cursor.
    window_posn: u32,
    /// Repeated-offset cache, most recent first.
    r0: u32,
    r1: u32,
    r2: u32,
    /// Live main tree symbol count for this window size.
    main_elements: usize,
    /// Whether the one-bit intel header has been consumed.
    header_read: bool,
    block_type: BlockType,
    block_length: u32,
    block_remaining: u32,
    frames_read: u32,
    intel_filesize: i32,
    intel_curpos: i32,
    intel_started: bool,
    pretree: HuffmanTable,
    maintree: HuffmanTable,
    lengthtree: HuffmanTable,
    alignedtree: HuffmanTable,
}

impl LzxDecoder {
    /// Create a decoder for the given window size exponent.
    ///
    /// The exponent must already be validated to 15..=21 (the folder parser
    /// rejects anything else).
    pub fn new(window_bits: u8) -> Self {
        debug_assert!((15..=21).contains(&window_bits));
        let window_size = 1u32 << window_bits;

        // Position slots needed to address the window.
        let posn_slots = match window_bits {
            20 => 42,
            21 => 50,
            bits => u32::from(bits) * 2,
        };

        Self {
            window: vec![WINDOW_FILL; window_size as usize],
            window_size,
            window_posn: 0,
            r0: 1,
            r1: 1,
            r2: 1,
            main_elements: (NUM_CHARS + (posn_slots << 3)) as usize,
            header_read: false,
            block_type: BlockType::Invalid,
            block_length: 0,
            block_remaining: 0,
            frames_read: 0,
            intel_filesize: 0,
            intel_curpos: 0,
            intel_started: false,
            pretree: HuffmanTable::new(PRETREE_NUM_ELEMENTS, PRETREE_TABLEBITS),
            maintree: HuffmanTable::new(MAINTREE_MAXSYMBOLS, MAINTREE_TABLEBITS),
            lengthtree: HuffmanTable::new(LENGTH_MAXSYMBOLS, LENGTH_TABLEBITS),
            alignedtree: HuffmanTable::new(ALIGNED_NUM_ELEMENTS, ALIGNED_TABLEBITS),
        }
    }

    /// Decode one data block: exactly `out.len()` bytes from `input`.
    ///
    /// Huffman priming may read up to 16 bits past the declared input; any
    /// further overrun is fatal.
    pub fn decompress_block(&mut self, input: &[u8], out: &mut [u8]) -> Result<FrameKind> {
        let mut reader = BitReader::new(input);

        // One-bit stream header: optional 32-bit E8 target file size.
        if !self.header_read {
            if reader.read(1) != 0 {
                let hi = reader.read(16);
                let lo = reader.read(16);
                self.intel_filesize = ((hi << 16) | lo) as i32;
            }
            self.header_read = true;
        }

        let mut togo = out.len() as i64;
        while togo > 0 {
            if self.block_remaining == 0 {
                if self.block_type == BlockType::Uncompressed {
                    // Odd-length raw blocks carry one pad byte; the bit
                    // stream restarts on a 16-bit boundary.
                    if self.block_length & 1 == 1 {
                        reader.skip_byte();
                    }
                    reader.init();
                }

                let type_bits = reader.read(3);
                let hi = reader.read(16);
                let lo = reader.read(8);
                self.block_length = (hi << 8) | lo;
                self.block_remaining = self.block_length;
                self.block_type = BlockType::from_bits(type_bits)?;

                match self.block_type {
                    BlockType::Aligned => {
                        for i in 0..ALIGNED_NUM_ELEMENTS {
                            self.alignedtree.lengths_mut()[i] = reader.read(3) as u8;
                        }
                        self.alignedtree.rebuild()?;
                        self.read_block_trees(&mut reader)?;
                    }
                    BlockType::Verbatim => {
                        self.read_block_trees(&mut reader)?;
                    }
                    BlockType::Uncompressed => {
                        self.intel_started = true;
                        // Realign to a 16-bit boundary, unloading a word if
                        // the buffer over-fetched.
                        reader.ensure(16);
                        if reader.bits_available() > 16 {
                            reader.rewind(2);
                        }
                        reader.init();
                        self.r0 = reader.read_u32_le().ok_or(DecompressError::UnexpectedEof)?;
                        self.r1 = reader.read_u32_le().ok_or(DecompressError::UnexpectedEof)?;
                        self.r2 = reader.read_u32_le().ok_or(DecompressError::UnexpectedEof)?;
                    }
                    BlockType::Invalid => unreachable!(),
                }
            }

            // Input exhaustion: table priming may over-read one 16-bit word.
            if reader.bytes_consumed() > input.len()
                && (reader.bytes_consumed() > input.len() + 2 || reader.bits_available() < 16)
            {
                return Err(DecompressError::UnexpectedEof);
            }

            while self.block_remaining > 0 && togo > 0 {
                let mut this_run = i64::from(self.block_remaining);
                if this_run > togo {
                    this_run = togo;
                }
                togo -= this_run;
                self.block_remaining -= this_run as u32;

                self.window_posn &= self.window_size - 1;
                if i64::from(self.window_posn) + this_run > i64::from(self.window_size) {
                    return Err(DecompressError::WindowOverrun {
                        position: self.window_posn,
                        needed: this_run as u32,
                    });
                }

                match self.block_type {
                    BlockType::Verbatim => self.decode_run(&mut reader, this_run, false)?,
                    BlockType::Aligned => self.decode_run(&mut reader, this_run, true)?,
                    BlockType::Uncompressed => {
                        let posn = self.window_posn as usize;
                        reader
                            .read_bytes(&mut self.window[posn..posn + this_run as usize])
                            .ok_or(DecompressError::UnexpectedEof)?;
                        self.window_posn += this_run as u32;
                    }
                    BlockType::Invalid => unreachable!(),
                }
            }
        }

        if togo != 0 {
            return Err(DecompressError::IncompleteData);
        }

        // Frames never straddle the window boundary, so the block's output
        // is the contiguous region ending at the cursor.
        let end = if self.window_posn == 0 {
            self.window_size as usize
        } else {
            self.window_posn as usize
        };
        let start = end
            .checked_sub(out.len())
            .ok_or(DecompressError::IncompleteData)?;
        out.copy_from_slice(&self.window[start..end]);

        let frame = self.frames_read;
        self.frames_read += 1;
        if frame < MAX_E8_FRAMES && self.intel_filesize != 0 {
            if out.len() <= 6 || !self.intel_started {
                self.intel_curpos += out.len() as i32;
            } else {
                self.undo_e8_transform(out);
                return Ok(FrameKind::CallTargetsRewritten);
            }
        }
        Ok(FrameKind::Decoded)
    }

    /// Read the main and length trees for a VERBATIM/ALIGNED block header.
    fn read_block_trees(&mut self, reader: &mut BitReader) -> Result<()> {
        read_lengths(&mut self.pretree, self.maintree.lengths_mut(), 0, 256, reader)?;
        read_lengths(
            &mut self.pretree,
            self.maintree.lengths_mut(),
            256,
            self.main_elements,
            reader,
        )?;
        self.maintree.rebuild()?;
        // A live code for the CALL opcode byte switches the E8 pass on.
        if self.maintree.lengths()[0xE8] != 0 {
            self.intel_started = true;
        }

        read_lengths(
            &mut self.pretree,
            self.lengthtree.lengths_mut(),
            0,
            NUM_SECONDARY_LENGTHS,
            reader,
        )?;
        self.lengthtree.rebuild()
    }

    /// Decode literals and matches until `this_run` output bytes are
    /// produced. VERBATIM and ALIGNED differ only in how a new offset's
    /// extra bits are coded.
    fn decode_run(&mut self, reader: &mut BitReader, mut this_run: i64, aligned: bool) -> Result<()> {
        while this_run > 0 {
            let main_element = u32::from(self.maintree.decode(reader)?);

            if main_element < NUM_CHARS {
                self.window[self.window_posn as usize] = main_element as u8;
                self.window_posn += 1;
                this_run -= 1;
                continue;
            }

            let main_element = main_element - NUM_CHARS;

            let mut match_length = i64::from(main_element & NUM_PRIMARY_LENGTHS);
            if match_length == i64::from(NUM_PRIMARY_LENGTHS) {
                match_length += i64::from(self.lengthtree.decode(reader)?);
            }
            match_length += i64::from(MIN_MATCH);

            let slot = main_element >> 3;
            let match_offset = match slot {
                0 => self.r0,
                1 => {
                    let offset = self.r1;
                    self.r1 = self.r0;
                    self.r0 = offset;
                    offset
                }
                2 => {
                    let offset = self.r2;
                    self.r2 = self.r0;
                    self.r0 = offset;
                    offset
                }
                _ => {
                    let offset = if aligned {
                        self.read_aligned_offset(reader, slot as usize)?
                    } else if slot == 3 {
                        1
                    } else {
                        let extra = slot_extra_bits(slot as usize);
                        POSITION_BASE[slot as usize] - 2 + reader.read(extra)
                    };
                    self.r2 = self.r1;
                    self.r1 = self.r0;
                    self.r0 = offset;
                    offset
                }
            };

            if match_offset == 0 || match_offset > self.window_size {
                return Err(DecompressError::WindowOverrun {
                    position: self.window_posn,
                    needed: match_offset,
                });
            }

            let mut rundest = self.window_posn as usize;
            this_run -= match_length;

            let mut runsrc;
            if self.window_posn >= match_offset {
                runsrc = rundest - match_offset as usize;
            } else {
                // Source starts before the window origin: copy the tail of
                // the window first, then continue from position 0.
                runsrc = rundest + (self.window_size - match_offset) as usize;
                let wrapped = i64::from(match_offset) - i64::from(self.window_posn);
                if wrapped < match_length {
                    match_length -= wrapped;
                    self.window_posn += wrapped as u32;
                    for _ in 0..wrapped {
                        self.window[rundest] = self.window[runsrc];
                        rundest += 1;
                        runsrc += 1;
                    }
                    runsrc = 0;
                }
            }

            if rundest as i64 + match_length > i64::from(self.window_size) {
                return Err(DecompressError::WindowOverrun {
                    position: rundest as u32,
                    needed: match_length as u32,
                });
            }

            self.window_posn += match_length as u32;
            // Byte-by-byte: source and destination may overlap for
            // run-length patterns.
            for _ in 0..match_length {
                self.window[rundest] = self.window[runsrc];
                rundest += 1;
                runsrc += 1;
            }
        }
        Ok(())
    }

    /// Decode a new absolute offset in an ALIGNED block: verbatim high bits
    /// plus a Huffman-coded low 3 bits when at least 3 extra bits exist.
    fn read_aligned_offset(&mut self, reader: &mut BitReader, slot: usize) -> Result<u32> {
        let extra = slot_extra_bits(slot);
        let mut offset = POSITION_BASE[slot] - 2;
        if extra > 3 {
            offset += reader.read(extra - 3) << 3;
            offset += u32::from(self.alignedtree.decode(reader)?);
        } else if extra == 3 {
            offset += u32::from(self.alignedtree.decode(reader)?);
        } else if extra > 0 {
            offset += reader.read(extra);
        } else {
            offset = 1;
        }
        Ok(offset)
    }

    /// Rewrite absolute x86 CALL targets back to relative form in place.
    ///
    /// `curpos` advances by 5 per candidate whether or not it was rewritten,
    /// matching the forward transform's scan.
    fn undo_e8_transform(&mut self, out: &mut [u8]) {
        let dataend = out.len() as i64 - 10;
        let mut curpos = self.intel_curpos;
        self.intel_curpos += out.len() as i32;

        let mut pos: i64 = 0;
        while pos < dataend {
            if out[pos as usize] != 0xE8 {
                pos += 1;
                curpos += 1;
                continue;
            }
            let at = pos as usize + 1;
            let absolute = i32::from_le_bytes([out[at], out[at + 1], out[at + 2], out[at + 3]]);
            if absolute >= -curpos && absolute < self.intel_filesize {
                let relative = if absolute >= 0 {
                    absolute.wrapping_sub(curpos)
                } else {
                    absolute.wrapping_add(self.intel_filesize)
                };
                out[at..at + 4].copy_from_slice(&relative.to_le_bytes());
            }
            pos += 5;
            curpos += 5;
        }
    }
}

/// Read a run of Huffman code lengths as deltas against their previous
/// values, decoded through a freshly transmitted pretree.
///
/// Pretree codes 17 and 18 zero out runs of 4+ and 20+ symbols; 19 repeats
/// one decoded delta 4 or 5 times; anything else is a single delta
/// `(previous - code) mod 17`.
fn read_lengths(
    pretree: &mut HuffmanTable,
    lens: &mut [u8],
    first: usize,
    last: usize,
    reader: &mut BitReader,
) -> Result<()> {
    for i in 0..PRETREE_NUM_ELEMENTS {
        pretree.lengths_mut()[i] = reader.read(4) as u8;
    }
    pretree.rebuild()?;

    let mut x = first;
    while x < last {
        let code = pretree.decode(reader)?;
        match code {
            17 => {
                let run = reader.read(4) + 4;
                for _ in 0..run {
                    if x >= last {
                        break;
                    }
                    lens[x] = 0;
                    x += 1;
                }
            }
            18 => {
                let run = reader.read(5) + 20;
                for _ in 0..run {
                    if x >= last {
                        break;
                    }
                    lens[x] = 0;
                    x += 1;
                }
            }
            19 => {
                let run = reader.read(1) + 4;
                let delta = i32::from(pretree.decode(reader)?);
                let mut value = i32::from(lens[x]) - delta;
                if value < 0 {
                    value += 17;
                }
                for _ in 0..run {
                    if x >= last {
                        break;
                    }
                    lens[x] = value as u8;
                    x += 1;
                }
            }
            delta => {
                let mut value = i32::from(lens[x]) - i32::from(delta);
                if value < 0 {
                    value += 17;
                }
                lens[x] = value as u8;
                x += 1;
            }
        }
    }
    Ok(())
}
