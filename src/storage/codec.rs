//! Framing for on-disk artifacts.
//!
//! Every artifact file starts with a header naming what it holds:
//!
//! ```text
//! [magic "ONTL": 4][codec version: 1][artifact tag: 1]
//! ```
//!
//! Structured artifacts follow it with one checksummed JSON record:
//!
//! ```text
//! [version: 1][length: u32 LE][payload: JSON][crc32(payload): u32 LE]
//! ```
//!
//! Raw payloads (the flat vector blob) write their own body after the header.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Error as IoError, ErrorKind, Read, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes to identify ontolink artifact files.
pub const MAGIC: [u8; 4] = *b"ONTL";

/// Records larger than this are rejected on read (1 GiB).
const MAX_RECORD_LEN: usize = 1 << 30;

/// What an artifact file holds. Reading a file with the wrong tag fails
/// instead of misinterpreting its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArtifactTag {
    /// Index manifest.
    Manifest = 1,
    /// Columnar metadata table.
    MetadataTable = 2,
    /// Dictionary synonym rows.
    Synonyms = 3,
    /// Embedding matrix stored as a record.
    Embeddings = 4,
    /// Raw little-endian f32 matrix.
    FlatVectors = 5,
    /// Fitted document vectorizer.
    Vectorizer = 6,
}

impl ArtifactTag {
    const ALL: [Self; 6] = [
        Self::Manifest,
        Self::MetadataTable,
        Self::Synonyms,
        Self::Embeddings,
        Self::FlatVectors,
        Self::Vectorizer,
    ];

    fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| *tag as u8 == byte)
    }
}

fn invalid(message: impl Into<String>) -> IoError {
    IoError::new(ErrorKind::InvalidData, message.into())
}

fn read_array<const N: usize>(reader: &mut impl Read) -> IoResult<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Serializes `value` into one framed record.
///
/// # Errors
/// `InvalidData` if serialization fails or the payload exceeds the `u32`
/// length prefix.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| invalid(format!("record of {} bytes does not fit the length prefix", payload.len())))?;

    let mut record = Vec::with_capacity(payload.len() + 9);
    record.push(CODEC_VERSION);
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(&payload);
    record.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(record)
}

/// Reads one framed record and deserializes it.
///
/// # Errors
/// `InvalidData` on an unknown version, an oversized length, a checksum
/// mismatch, or a payload that does not deserialize as `T`.
/// `UnexpectedEof` if the record is truncated.
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let [version] = read_array::<1>(reader)?;
    if version != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported codec version: {version} (expected {CODEC_VERSION})"
        )));
    }

    let len = u32::from_le_bytes(read_array(reader)?) as usize;
    if len > MAX_RECORD_LEN {
        return Err(invalid(format!("record size {len} exceeds maximum {MAX_RECORD_LEN}")));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    let stored = u32::from_le_bytes(read_array(reader)?);
    let computed = crc32fast::hash(&payload);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    serde_json::from_slice(&payload).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes the artifact header.
pub fn write_header(writer: &mut impl Write, tag: ArtifactTag) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION, tag as u8])
}

/// Reads the artifact header and checks it names `expected`.
///
/// # Errors
/// `InvalidData` for foreign files, unknown versions, or a different tag.
pub fn read_header(reader: &mut impl Read, expected: ArtifactTag) -> IoResult<()> {
    let magic: [u8; 4] = read_array(reader)?;
    if magic != MAGIC {
        return Err(invalid(format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}")));
    }

    let [version, tag] = read_array::<2>(reader)?;
    if version != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported artifact version: {version} (expected {CODEC_VERSION})"
        )));
    }
    match ArtifactTag::from_byte(tag) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(invalid(format!("artifact holds {found:?}, expected {expected:?}"))),
        None => Err(invalid(format!("unknown artifact tag {tag}"))),
    }
}

/// Writes a file via a sibling `.partial` file renamed into place, so readers
/// never observe a half-written artifact.
pub fn write_atomic(path: &Path, body: impl FnOnce(&mut BufWriter<File>) -> IoResult<()>) -> IoResult<()> {
    let partial = partial_path(path);
    {
        let mut writer = BufWriter::new(File::create(&partial)?);
        body(&mut writer)?;
        writer.flush()?;
    }
    fs::rename(&partial, path)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `value` as a single-record artifact.
pub fn write_file<T: Serialize>(path: &Path, tag: ArtifactTag, value: &T) -> IoResult<()> {
    let record = encode(value)?;
    write_atomic(path, |w| {
        write_header(w, tag)?;
        w.write_all(&record)
    })
}

/// Reads a single-record artifact written by [`write_file`].
pub fn read_file<T: DeserializeOwned>(path: &Path, tag: ArtifactTag) -> IoResult<T> {
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader, tag)?;
    decode(&mut reader)
}
