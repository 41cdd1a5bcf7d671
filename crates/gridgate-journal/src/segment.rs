//! On-disk segment framing
//!
//! A journal is a directory of segment files. Each segment starts with a
//! fixed header and contains a sequence of framed records:
//!
//! ```text
//! +--------+------+-------+--------+---------+--------+
//! | Magic  | Kind | Index | Length | Payload | CRC32C |
//! | 4B     | 1B   | 4B    | 4B     | var     | 4B     |
//! +--------+------+-------+--------+---------+--------+
//! ```
//!
//! `Index` is the record's ordinal within its segment and is part of its
//! durable identity; compaction preserves it when rewriting a segment.

use crate::error::{JournalError, JournalResult};
use std::io::{self, Read, Write};

/// Segment file header magic number
pub(crate) const SEGMENT_MAGIC: u32 = 0x4753_4547; // "GSEG"

/// Segment format version
pub(crate) const SEGMENT_VERSION: u32 = 1;

/// Segment header size (magic + version + segment id)
pub(crate) const SEGMENT_HEADER_SIZE: u64 = 16;

/// Record magic number
pub(crate) const RECORD_MAGIC: u32 = 0x474A_524E; // "GJRN"

/// Record header size (magic + kind + index + length)
pub(crate) const RECORD_HEADER_SIZE: usize = 13;

/// Record trailer size (CRC32C)
pub(crate) const RECORD_TRAILER_SIZE: usize = 4;

/// Upper bound on a single record payload; anything larger is framing junk
const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordKind {
    /// An appended payload
    Data = 1,
    /// A deletion marker naming another record's location
    Tombstone = 2,
}

impl RecordKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Data),
            2 => Some(Self::Tombstone),
            _ => None,
        }
    }
}

/// A record as parsed from a segment file
#[derive(Debug)]
pub(crate) struct RawRecord {
    pub kind: RecordKind,
    pub index: u32,
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Size of this record as framed on disk
    pub fn framed_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.payload.len() + RECORD_TRAILER_SIZE) as u64
    }
}

/// Outcome of reading one record from a segment stream
#[derive(Debug)]
pub(crate) enum ScanItem {
    /// A complete, checksummed record
    Record(RawRecord),
    /// Clean end of the segment
    Eof,
    /// Unparseable bytes from this point on (torn tail or corruption)
    Invalid(String),
}

/// Name of a segment file
pub(crate) fn file_name(segment: u64) -> String {
    format!("segment-{segment:010}.wal")
}

/// Parse a segment id out of a file name, if it is a segment file
pub(crate) fn parse_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("segment-")?
        .strip_suffix(".wal")?
        .parse()
        .ok()
}

/// Write a segment header
pub(crate) fn write_header<W: Write>(writer: &mut W, segment: u64) -> io::Result<()> {
    writer.write_all(&SEGMENT_MAGIC.to_le_bytes())?;
    writer.write_all(&SEGMENT_VERSION.to_le_bytes())?;
    writer.write_all(&segment.to_le_bytes())
}

/// Read and validate a segment header
pub(crate) fn read_header<R: Read>(reader: &mut R, segment: u64) -> JournalResult<()> {
    let mut buf = [0u8; SEGMENT_HEADER_SIZE as usize];
    reader.read_exact(&mut buf).map_err(|_| corrupt(segment, 0, "truncated header"))?;

    let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if magic != SEGMENT_MAGIC {
        return Err(corrupt(segment, 0, "bad segment magic"));
    }
    let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    if version != SEGMENT_VERSION {
        return Err(corrupt(segment, 0, format!("unsupported version {version}")));
    }
    let stored_id = u64::from_le_bytes(buf[8..16].try_into().unwrap());
    if stored_id != segment {
        return Err(corrupt(segment, 0, format!("header names segment {stored_id}")));
    }
    Ok(())
}

/// Frame a record for appending
pub(crate) fn encode_record(kind: RecordKind, index: u32, payload: &[u8]) -> Vec<u8> {
    let total = RECORD_HEADER_SIZE + payload.len() + RECORD_TRAILER_SIZE;
    let mut buf = Vec::with_capacity(total);

    buf.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
    buf.push(kind as u8);
    buf.extend_from_slice(&index.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);

    // CRC over everything before the CRC field
    let crc = crc32c::crc32c(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    buf
}

/// Encode a tombstone payload naming the target record
pub(crate) fn encode_tombstone(segment: u64, index: u32) -> [u8; 12] {
    let mut buf = [0u8; 12];
    buf[0..8].copy_from_slice(&segment.to_le_bytes());
    buf[8..12].copy_from_slice(&index.to_le_bytes());
    buf
}

/// Decode a tombstone payload
pub(crate) fn decode_tombstone(payload: &[u8]) -> Option<(u64, u32)> {
    if payload.len() != 12 {
        return None;
    }
    let segment = u64::from_le_bytes(payload[0..8].try_into().unwrap());
    let index = u32::from_le_bytes(payload[8..12].try_into().unwrap());
    Some((segment, index))
}

/// Read the next record from a segment stream.
///
/// Returns `Eof` on a clean end, `Invalid` for anything unparseable from the
/// current position (the caller decides whether that is a torn tail to
/// truncate or corruption to reject), and `Err` only for real I/O failures.
pub(crate) fn read_record<R: Read>(reader: &mut R) -> JournalResult<ScanItem> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    match read_full(reader, &mut header)? {
        0 => return Ok(ScanItem::Eof),
        n if n < RECORD_HEADER_SIZE => return Ok(ScanItem::Invalid("truncated record header".into())),
        _ => {}
    }

    let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    if magic != RECORD_MAGIC {
        return Ok(ScanItem::Invalid("bad record magic".into()));
    }
    let Some(kind) = RecordKind::from_u8(header[4]) else {
        return Ok(ScanItem::Invalid(format!("bad record kind {}", header[4])));
    };
    let index = u32::from_le_bytes(header[5..9].try_into().unwrap());
    let len = u32::from_le_bytes(header[9..13].try_into().unwrap()) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Ok(ScanItem::Invalid(format!("implausible payload length {len}")));
    }

    let mut body = vec![0u8; len + RECORD_TRAILER_SIZE];
    if read_full(reader, &mut body)? < body.len() {
        return Ok(ScanItem::Invalid("truncated record payload".into()));
    }

    let stored_crc = u32::from_le_bytes(body[len..len + 4].try_into().unwrap());
    let mut crc = crc32c::crc32c(&header);
    crc = crc32c::crc32c_append(crc, &body[..len]);
    if crc != stored_crc {
        return Ok(ScanItem::Invalid("record CRC mismatch".into()));
    }

    body.truncate(len);
    Ok(ScanItem::Record(RawRecord {
        kind,
        index,
        payload: body,
    }))
}

/// Read as many bytes as available into `buf`, returning the count
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub(crate) fn corrupt(segment: u64, offset: u64, reason: impl Into<String>) -> JournalError {
    JournalError::Corrupt {
        segment,
        offset,
        reason: reason.into(),
    }
}
