//! End-to-end cabinet tests over in-memory archives built byte by byte.

use std::io::Cursor;
use std::io::Write;

use cab_stream::{CabError, Cabinet, DecompressError};

/// DOS date/time 2025-04-11 13:49:10.
const DOS_DATE: u16 = 0x5A8B;
const DOS_TIME: u16 = 0x6E25;

struct FolderSpec {
    type_compress: u16,
    /// (compressed payload, uncompressed size) per data block.
    blocks: Vec<(Vec<u8>, u16)>,
}

struct FileSpec {
    name: &'static str,
    size: u32,
    folder_offset: u32,
    folder: u16,
    attribs: u16,
}

/// Assemble a complete single-cabinet archive.
fn build_cabinet(folders: &[FolderSpec], files: &[FileSpec]) -> Vec<u8> {
    let coff_files = 36 + 8 * folders.len() as u32;
    let file_table: u32 = files.iter().map(|f| 17 + f.name.len() as u32).sum();

    let mut data_offsets = Vec::new();
    let mut offset = coff_files + file_table;
    for folder in folders {
        data_offsets.push(offset);
        for (payload, _) in &folder.blocks {
            offset += 8 + payload.len() as u32;
        }
    }
    let total = offset;

    let mut cab = Vec::new();
    cab.extend_from_slice(b"MSCF");
    cab.extend_from_slice(&0u32.to_le_bytes());
    cab.extend_from_slice(&total.to_le_bytes());
    cab.extend_from_slice(&0u32.to_le_bytes());
    cab.extend_from_slice(&coff_files.to_le_bytes());
    cab.extend_from_slice(&0u32.to_le_bytes());
    cab.push(3); // minor version
    cab.push(1); // major version
    cab.extend_from_slice(&(folders.len() as u16).to_le_bytes());
    cab.extend_from_slice(&(files.len() as u16).to_le_bytes());
    cab.extend_from_slice(&0u16.to_le_bytes()); // flags
    cab.extend_from_slice(&0x1234u16.to_le_bytes()); // set id
    cab.extend_from_slice(&0u16.to_le_bytes()); // index in set

    for (i, folder) in folders.iter().enumerate() {
        cab.extend_from_slice(&data_offsets[i].to_le_bytes());
        cab.extend_from_slice(&(folder.blocks.len() as u16).to_le_bytes());
        cab.extend_from_slice(&folder.type_compress.to_le_bytes());
    }

    for file in files {
        cab.extend_from_slice(&file.size.to_le_bytes());
        cab.extend_from_slice(&file.folder_offset.to_le_bytes());
        cab.extend_from_slice(&file.folder.to_le_bytes());
        cab.extend_from_slice(&DOS_DATE.to_le_bytes());
        cab.extend_from_slice(&DOS_TIME.to_le_bytes());
        cab.extend_from_slice(&file.attribs.to_le_bytes());
        cab.extend_from_slice(file.name.as_bytes());
        cab.push(0);
    }

    for folder in folders {
        for (payload, uncompressed) in &folder.blocks {
            cab.extend_from_slice(&0u32.to_le_bytes()); // checksum, unverified
            cab.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            cab.extend_from_slice(&uncompressed.to_le_bytes());
            cab.extend_from_slice(payload);
        }
    }
    cab
}

fn store_folder(blocks: &[&[u8]]) -> FolderSpec {
    FolderSpec {
        type_compress: 0,
        blocks: blocks
            .iter()
            .map(|b| (b.to_vec(), b.len() as u16))
            .collect(),
    }
}

fn open(bytes: Vec<u8>) -> Cabinet<Cursor<Vec<u8>>> {
    Cabinet::open(Cursor::new(bytes)).unwrap()
}

#[test]
fn test_read_stored_file() {
    let cab = build_cabinet(
        &[store_folder(&[b"Hello World"])],
        &[FileSpec {
            name: "hello.txt",
            size: 11,
            folder_offset: 0,
            folder: 0,
            attribs: 0x20,
        }],
    );
    let mut cabinet = open(cab);
    assert_eq!(cabinet.entries().len(), 1);
    assert_eq!(cabinet.entries()[0].name, "hello.txt");
    assert_eq!(cabinet.read_file("hello.txt").unwrap(), b"Hello World");
}

#[test]
fn test_read_file_is_case_insensitive() {
    let cab = build_cabinet(
        &[store_folder(&[b"data"])],
        &[FileSpec {
            name: "Readme.TXT",
            size: 4,
            folder_offset: 0,
            folder: 0,
            attribs: 0,
        }],
    );
    let mut cabinet = open(cab);
    assert_eq!(cabinet.read_file("readme.txt").unwrap(), b"data");
    assert_eq!(cabinet.read_file("README.txt").unwrap(), b"data");
    assert!(matches!(
        cabinet.read_file("missing.txt"),
        Err(CabError::FileNotFound(_))
    ));
}

#[test]
fn test_files_sharing_and_spanning_blocks() {
    // Folder output "aaaabbbbbbbbcccc" cut as 6 + 4 + 6: the second file
    // spans all three blocks (consuming the middle one whole), the first
    // and third share its edge blocks.
    let cab = build_cabinet(
        &[store_folder(&[b"aaaabb", b"bbbb", b"bbcccc"])],
        &[
            FileSpec {
                name: "a.bin",
                size: 4,
                folder_offset: 0,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "b.bin",
                size: 8,
                folder_offset: 4,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "c.bin",
                size: 4,
                folder_offset: 12,
                folder: 0,
                attribs: 0,
            },
        ],
    );
    let mut cabinet = open(cab);
    assert_eq!(cabinet.read_file("a.bin").unwrap(), b"aaaa");
    assert_eq!(cabinet.read_file("b.bin").unwrap(), b"bbbbbbbb");
    assert_eq!(cabinet.read_file("c.bin").unwrap(), b"cccc");

    // The three-block file must come out identically through extraction,
    // which slices its middle block whole.
    let dir = tempfile::tempdir().unwrap();
    cabinet.extract_all(dir.path(), None).unwrap();
    for name in ["a.bin", "b.bin", "c.bin"] {
        let extracted = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(extracted, cabinet.read_file(name).unwrap(), "{name}");
    }
}

#[test]
fn test_extract_all_matches_read_file() {
    let cab = build_cabinet(
        &[store_folder(&[b"first", b"secondthird"])],
        &[
            FileSpec {
                name: "one.txt",
                size: 5,
                folder_offset: 0,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "two.txt",
                size: 6,
                folder_offset: 5,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "three.txt",
                size: 5,
                folder_offset: 11,
                folder: 0,
                attribs: 0,
            },
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let mut cabinet = open(cab);
    cabinet.extract_all(dir.path(), None).unwrap();

    for name in ["one.txt", "two.txt", "three.txt"] {
        let extracted = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(extracted, cabinet.read_file(name).unwrap(), "{name}");
    }
}

#[test]
fn test_extract_reports_progress() {
    let cab = build_cabinet(
        &[store_folder(&[b"aabb"])],
        &[
            FileSpec {
                name: "a.txt",
                size: 2,
                folder_offset: 0,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "b.txt",
                size: 2,
                folder_offset: 2,
                folder: 0,
                attribs: 0,
            },
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let mut cabinet = open(cab);

    let mut reported: Vec<(u32, String)> = Vec::new();
    let mut callback = |percent: u32, name: &str| reported.push((percent, name.to_string()));
    cabinet.extract_all(dir.path(), Some(&mut callback)).unwrap();

    assert_eq!(
        reported,
        vec![(50, "a.txt".to_string()), (100, "b.txt".to_string())]
    );
}

#[test]
fn test_extract_restores_metadata_and_directories() {
    let cab = build_cabinet(
        &[store_folder(&[b"nested"])],
        &[FileSpec {
            name: "docs\\sub\\note.txt",
            size: 6,
            folder_offset: 0,
            folder: 0,
            attribs: 0x01, // read-only
        }],
    );
    let dir = tempfile::tempdir().unwrap();
    let mut cabinet = open(cab);
    cabinet.extract_all(dir.path(), None).unwrap();

    let path = dir.path().join("docs").join("sub").join("note.txt");
    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.permissions().readonly());
    assert_eq!(
        metadata.modified().unwrap(),
        cabinet.entries()[0].timestamp.to_system_time()
    );
    assert_eq!(std::fs::read(&path).unwrap(), b"nested");
}

#[test]
fn test_zero_length_file_extracts_empty() {
    let cab = build_cabinet(
        &[store_folder(&[b"x"])],
        &[
            FileSpec {
                name: "empty.dat",
                size: 0,
                folder_offset: 0,
                folder: 0,
                attribs: 0,
            },
            FileSpec {
                name: "x.dat",
                size: 1,
                folder_offset: 0,
                folder: 0,
                attribs: 0,
            },
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let mut cabinet = open(cab);
    assert_eq!(cabinet.read_file("empty.dat").unwrap(), b"");
    cabinet.extract_all(dir.path(), None).unwrap();
    assert_eq!(
        std::fs::metadata(dir.path().join("empty.dat")).unwrap().len(),
        0
    );
}

#[test]
fn test_mszip_folder() {
    let payload = b"MSZIP compressed cabinet contents, repeated: MSZIP MSZIP";
    let mut block = b"CK".to_vec();
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    block.extend_from_slice(&encoder.finish().unwrap());

    let cab = build_cabinet(
        &[FolderSpec {
            type_compress: 1,
            blocks: vec![(block, payload.len() as u16)],
        }],
        &[FileSpec {
            name: "packed.txt",
            size: payload.len() as u32,
            folder_offset: 0,
            folder: 0,
            attribs: 0,
        }],
    );
    let mut cabinet = open(cab);
    assert_eq!(cabinet.read_file("packed.txt").unwrap(), payload);
}

#[test]
fn test_mszip_folder_with_chained_dictionary() {
    // Two MSZIP blocks in one folder; the second is deflated against the
    // first's output as preset dictionary, so decoding it depends on the
    // history chained across blocks.
    let first = b"cabinet folders chain their DEFLATE history between blocks";
    let second = b"cabinet folders chain their DEFLATE history between blocks!!";

    let mut first_block = b"CK".to_vec();
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(first).unwrap();
    first_block.extend_from_slice(&encoder.finish().unwrap());

    let mut compressor = flate2::Compress::new(flate2::Compression::default(), false);
    compressor.set_dictionary(first).unwrap();
    let mut deflated = vec![0u8; second.len() + 64];
    compressor
        .compress(second, &mut deflated, flate2::FlushCompress::Finish)
        .unwrap();
    deflated.truncate(compressor.total_out() as usize);
    let mut second_block = b"CK".to_vec();
    second_block.extend_from_slice(&deflated);

    let total = (first.len() + second.len()) as u32;
    let cab = build_cabinet(
        &[FolderSpec {
            type_compress: 1,
            blocks: vec![
                (first_block, first.len() as u16),
                (second_block, second.len() as u16),
            ],
        }],
        &[FileSpec {
            name: "chained.txt",
            size: total,
            folder_offset: 0,
            folder: 0,
            attribs: 0,
        }],
    );
    let mut cabinet = open(cab);
    let mut expected = first.to_vec();
    expected.extend_from_slice(second);
    assert_eq!(cabinet.read_file("chained.txt").unwrap(), expected);
}

#[test]
fn test_lzx_folder_with_uncompressed_block() {
    // One LZX block of type UNCOMPRESSED: 28 header bits (no E8 header,
    // type 3, 24-bit length 15), realignment, then R0-R2 and the raw bytes.
    let payload = b"Hello from LZX!";
    let mut block = vec![0x00, 0x30, 0xF0, 0x00];
    for r in [1u32, 1, 1] {
        block.extend_from_slice(&r.to_le_bytes());
    }
    block.extend_from_slice(payload);

    let cab = build_cabinet(
        &[FolderSpec {
            type_compress: 3 | (15 << 8),
            blocks: vec![(block, payload.len() as u16)],
        }],
        &[FileSpec {
            name: "lzx.bin",
            size: payload.len() as u32,
            folder_offset: 0,
            folder: 0,
            attribs: 0,
        }],
    );
    let mut cabinet = open(cab);
    assert_eq!(cabinet.read_file("lzx.bin").unwrap(), payload);
}

#[test]
fn test_bad_signature_rejected() {
    let mut cab = build_cabinet(&[store_folder(&[b"x"])], &[]);
    cab[0] = b'X';
    assert!(matches!(
        Cabinet::open(Cursor::new(cab)),
        Err(CabError::InvalidSignature)
    ));
}

#[test]
fn test_spanned_cabinet_rejected() {
    let mut cab = build_cabinet(&[store_folder(&[b"x"])], &[]);
    cab[30] = 0x01; // previous-cabinet flag
    assert!(matches!(
        Cabinet::open(Cursor::new(cab)),
        Err(CabError::SpannedCabinet)
    ));
}

#[test]
fn test_continuation_file_rejected() {
    let cab = build_cabinet(
        &[store_folder(&[b"x"])],
        &[FileSpec {
            name: "x.dat",
            size: 1,
            folder_offset: 0,
            folder: 0xFFFD, // continued-from-previous marker
            attribs: 0,
        }],
    );
    assert!(matches!(
        Cabinet::open(Cursor::new(cab)),
        Err(CabError::SpannedCabinet)
    ));
}

#[test]
fn test_quantum_folder_rejected() {
    let cab = build_cabinet(
        &[FolderSpec {
            type_compress: 2,
            blocks: vec![(b"q".to_vec(), 1)],
        }],
        &[],
    );
    assert!(matches!(
        Cabinet::open(Cursor::new(cab)),
        Err(CabError::UnsupportedCompression(2))
    ));
}

#[test]
fn test_file_table_offset_mismatch_rejected() {
    let mut cab = build_cabinet(&[store_folder(&[b"x"])], &[]);
    // coffFiles lives at bytes 16..20.
    let declared = u32::from_le_bytes([cab[16], cab[17], cab[18], cab[19]]);
    cab[16..20].copy_from_slice(&(declared + 1).to_le_bytes());
    assert!(matches!(
        Cabinet::open(Cursor::new(cab)),
        Err(CabError::FileTableOffset { .. })
    ));
}

#[test]
fn test_corrupt_mszip_block_fails() {
    let cab = build_cabinet(
        &[FolderSpec {
            type_compress: 1,
            blocks: vec![(b"XXnot deflate".to_vec(), 8)],
        }],
        &[FileSpec {
            name: "bad.bin",
            size: 8,
            folder_offset: 0,
            folder: 0,
            attribs: 0,
        }],
    );
    let mut cabinet = open(cab);
    assert!(matches!(
        cabinet.read_file("bad.bin"),
        Err(CabError::Decompress(DecompressError::BadBlockSignature(_)))
    ));
}
