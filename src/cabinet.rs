//! Cabinet archive access.
//!
//! A cabinet is one header, a list of folders (compression units), a file
//! table, and per folder a chain of data blocks. Files are byte ranges in
//! their folder's uncompressed output, so neighbouring files can share a
//! data block and one file can span several.
//!
//! [`Cabinet::open`] parses all metadata up front and indexes every data
//! block; extraction then streams each folder's blocks through one decoder
//! session in physical order.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::decompress::BlockDecoder;
use crate::error::{CabError, Result};
use crate::parsing::{CabinetHeader, DataHeader, FileEntry, Folder};

/// One indexed data block of a folder.
#[derive(Debug, Clone, Copy)]
struct DataBlock {
    /// Absolute offset of the compressed payload.
    payload_offset: u64,
    compressed_size: u16,
    /// Folder-relative offset of this block's first output byte.
    uncompressed_start: u32,
    uncompressed_size: u16,
}

impl DataBlock {
    fn uncompressed_end(&self) -> u32 {
        self.uncompressed_start + u32::from(self.uncompressed_size)
    }
}

/// A file's block range within its folder.
#[derive(Debug, Clone, Copy)]
struct BlockSpan {
    first_block: usize,
    /// Offset of the file's first byte within the first block.
    first_offset: u32,
    last_block: usize,
    /// Index of the file's last byte within the last block.
    last_offset: u32,
}

/// An open cabinet archive.
pub struct Cabinet<R: Read + Seek> {
    reader: R,
    header: CabinetHeader,
    folders: Vec<Folder>,
    files: Vec<FileEntry>,
    /// Per folder, its data blocks in physical order.
    data_maps: Vec<Vec<DataBlock>>,
    /// Per file, its block span. `None` for zero-length files.
    spans: Vec<Option<BlockSpan>>,
}

impl<R: Read + Seek> Cabinet<R> {
    /// Parse the cabinet's metadata and index its data blocks.
    ///
    /// Reads the header, every folder and file entry, and every data block
    /// header. Payload bytes are not touched until extraction.
    pub fn open(mut reader: R) -> Result<Self> {
        let header = CabinetHeader::read(&mut reader)?;

        let mut folders = Vec::with_capacity(header.folder_count as usize);
        for _ in 0..header.folder_count {
            folders.push(Folder::read(&mut reader, &header)?);
        }

        // The header states where the file table starts; by now the reader
        // must be exactly there.
        let actual = reader.stream_position()?;
        let declared = u64::from(header.file_table_offset);
        if actual != declared {
            return Err(CabError::FileTableOffset { declared, actual });
        }

        let mut files = Vec::with_capacity(header.file_count as usize);
        for _ in 0..header.file_count {
            let entry = FileEntry::read(&mut reader)?;
            if entry.folder_index >= header.folder_count {
                return Err(CabError::InvalidHeader);
            }
            files.push(entry);
        }

        let mut data_maps = Vec::with_capacity(folders.len());
        for folder in &folders {
            data_maps.push(index_folder_blocks(&mut reader, &header, folder)?);
        }

        let mut spans = Vec::with_capacity(files.len());
        for entry in &files {
            spans.push(block_span(&data_maps[entry.folder_index as usize], entry)?);
        }

        Ok(Self {
            reader,
            header,
            folders,
            files,
            data_maps,
            spans,
        })
    }

    pub fn header(&self) -> &CabinetHeader {
        &self.header
    }

    /// The cabinet's file entries, in file table order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.files
    }

    /// Extract every file into `dir`, recreating directory structure from
    /// the stored names.
    ///
    /// Each folder's blocks decode once, in physical order, no matter how
    /// many files they feed. `progress` is called as each file completes
    /// with the percentage done and the file's name.
    pub fn extract_all<P: AsRef<Path>>(
        &mut self,
        dir: P,
        mut progress: Option<&mut dyn FnMut(u32, &str)>,
    ) -> Result<()> {
        let dir = dir.as_ref();
        let total = self.files.len();
        let mut completed = 0usize;

        // Zero-length files have no blocks to decode.
        for index in 0..self.files.len() {
            if self.spans[index].is_some() {
                continue;
            }
            let entry = self.files[index].clone();
            let path = destination_path(dir, &entry);
            let file = create_destination(&path)?;
            finalize_file(file, &entry)?;
            completed += 1;
            report_progress(&mut progress, completed, total, &entry.name);
        }

        for folder_index in 0..self.folders.len() {
            // Files of this folder, paired with their spans. Cloned so the
            // block sink below does not borrow the cabinet.
            let members: Vec<(BlockSpan, FileEntry)> = self
                .files
                .iter()
                .zip(&self.spans)
                .filter(|(entry, _)| entry.folder_index as usize == folder_index)
                .filter_map(|(entry, span)| span.map(|s| (s, entry.clone())))
                .collect();
            if members.is_empty() {
                continue;
            }
            let last_needed = members.iter().map(|(s, _)| s.last_block).max().unwrap_or(0);

            let mut handles: Vec<Option<File>> = members.iter().map(|_| None).collect();

            self.decode_folder_blocks(folder_index, last_needed, |block_index, block| {
                for (member, (span, entry)) in members.iter().enumerate() {
                    if block_index < span.first_block || block_index > span.last_block {
                        continue;
                    }
                    if handles[member].is_none() {
                        let path = destination_path(dir, entry);
                        handles[member] = Some(create_destination(&path)?);
                    }
                    let from = if block_index == span.first_block {
                        span.first_offset as usize
                    } else {
                        0
                    };
                    let to = if block_index == span.last_block {
                        span.last_offset as usize + 1
                    } else {
                        block.len()
                    };
                    let handle = handles[member].as_mut().ok_or(CabError::InvalidHeader)?;
                    handle.write_all(&block[from..to])?;

                    if block_index == span.last_block {
                        if let Some(file) = handles[member].take() {
                            finalize_file(file, entry)?;
                        }
                        completed += 1;
                        report_progress(&mut progress, completed, total, &entry.name);
                    }
                }
                Ok(())
            })?;
        }

        Ok(())
    }

    /// Read one file into memory by name, matching case-insensitively.
    ///
    /// Decodes the file's folder from its first block, since decoder state
    /// chains across blocks.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let wanted = name.replace('\\', "/");
        let index = self
            .files
            .iter()
            .position(|entry| entry.normalized_name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| CabError::FileNotFound(name.to_string()))?;

        let Some(span) = self.spans[index] else {
            return Ok(Vec::new());
        };
        let entry = self.files[index].clone();
        let folder_index = entry.folder_index as usize;

        let mut out = Vec::with_capacity(entry.size as usize);
        self.decode_folder_blocks(folder_index, span.last_block, |block_index, block| {
            if block_index < span.first_block {
                return Ok(());
            }
            let from = if block_index == span.first_block {
                span.first_offset as usize
            } else {
                0
            };
            let to = if block_index == span.last_block {
                span.last_offset as usize + 1
            } else {
                block.len()
            };
            out.extend_from_slice(&block[from..to]);
            Ok(())
        })?;

        Ok(out)
    }

    /// Decode a folder's blocks `0..=last_block` in order through one
    /// decoder session, handing each decoded block to `sink`.
    fn decode_folder_blocks<F>(&mut self, folder_index: usize, last_block: usize, mut sink: F) -> Result<()>
    where
        F: FnMut(usize, &[u8]) -> Result<()>,
    {
        let blocks: Vec<DataBlock> = self.data_maps[folder_index][..=last_block].to_vec();
        let mut decoder = BlockDecoder::for_compression(self.folders[folder_index].compression);

        let mut input = Vec::new();
        let mut output = Vec::new();
        for (block_index, block) in blocks.iter().enumerate() {
            input.resize(block.compressed_size as usize, 0);
            output.resize(block.uncompressed_size as usize, 0);

            self.reader.seek(SeekFrom::Start(block.payload_offset))?;
            self.reader.read_exact(&mut input)?;
            decoder.decompress_block(&input, &mut output)?;

            sink(block_index, &output)?;
        }
        Ok(())
    }
}

/// Walk a folder's CFDATA chain, recording each payload position and the
/// uncompressed range it produces. Ranges partition the folder's output
/// contiguously from zero.
fn index_folder_blocks<R: Read + Seek>(
    reader: &mut R,
    header: &CabinetHeader,
    folder: &Folder,
) -> Result<Vec<DataBlock>> {
    reader.seek(SeekFrom::Start(u64::from(folder.data_offset)))?;

    let mut blocks = Vec::with_capacity(folder.block_count as usize);
    let mut uncompressed_start = 0u32;
    for _ in 0..folder.block_count {
        let data_header = DataHeader::read(reader, header)?;
        let payload_offset = reader.stream_position()?;
        blocks.push(DataBlock {
            payload_offset,
            compressed_size: data_header.compressed_size,
            uncompressed_start,
            uncompressed_size: data_header.uncompressed_size,
        });
        uncompressed_start = uncompressed_start
            .checked_add(u32::from(data_header.uncompressed_size))
            .ok_or(CabError::InvalidHeader)?;
        reader.seek(SeekFrom::Current(i64::from(data_header.compressed_size)))?;
    }
    Ok(blocks)
}

/// Locate the blocks holding a file's byte range within its folder.
fn block_span(blocks: &[DataBlock], entry: &FileEntry) -> Result<Option<BlockSpan>> {
    if entry.size == 0 {
        return Ok(None);
    }
    let first_byte = entry.folder_offset;
    let last_byte = first_byte
        .checked_add(entry.size - 1)
        .ok_or(CabError::InvalidHeader)?;

    let find = |byte: u32| {
        blocks
            .iter()
            .position(|b| byte >= b.uncompressed_start && byte < b.uncompressed_end())
    };
    let first_block = find(first_byte).ok_or(CabError::InvalidHeader)?;
    let last_block = find(last_byte).ok_or(CabError::InvalidHeader)?;

    Ok(Some(BlockSpan {
        first_block,
        first_offset: first_byte - blocks[first_block].uncompressed_start,
        last_block,
        last_offset: last_byte - blocks[last_block].uncompressed_start,
    }))
}

fn report_progress(
    progress: &mut Option<&mut dyn FnMut(u32, &str)>,
    completed: usize,
    total: usize,
    name: &str,
) {
    if let Some(callback) = progress.as_mut() {
        let percent = (completed * 100 / total.max(1)) as u32;
        callback(percent, name);
    }
}

/// Map a stored name onto a path under `dir`, dropping absolute and
/// parent-directory components.
fn destination_path(dir: &Path, entry: &FileEntry) -> PathBuf {
    let mut path = dir.to_path_buf();
    for part in entry.normalized_name().split('/') {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        path.push(part);
    }
    path
}

/// Create (or truncate) the destination file, clearing any leftover from a
/// previous extraction and creating parent directories.
fn create_destination(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // A read-only leftover would refuse truncation on some platforms.
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    Ok(file)
}

/// Apply stored metadata to a completed file: DOS timestamp and the
/// read-only attribute.
fn finalize_file(file: File, entry: &FileEntry) -> Result<()> {
    let time = entry.timestamp.to_system_time();
    let times = FileTimes::new().set_accessed(time).set_modified(time);
    file.set_times(times)?;

    if entry.attributes.is_read_only() {
        let mut permissions = file.metadata()?.permissions();
        permissions.set_readonly(true);
        file.set_permissions(permissions)?;
    }
    Ok(())
}
