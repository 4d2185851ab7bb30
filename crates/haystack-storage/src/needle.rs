//! The needle: one stored blob plus its framing, in memory and on disk.
//!
//! # On-disk format
//!
//! ```text
//! [Cookie:u32][Offset:u64][Size:u32][DataSize:u32][Data][Flags:u8]
//!   [NameSize:u8][Name]? [MimeSize:u8][Mime]? [LastModified:5B]?
//!   [Checksum:u32][Padding: 0-7 zero bytes]
//! ```
//!
//! All multi-byte integers are big-endian. `Size` covers everything from
//! `DataSize` through the optional sections, but excludes the 16-byte
//! header, the checksum, and the padding.
//!
//! The same field set (minus `Offset` and `Size`, which are positional and
//! assigned by the volume rather than carried by the writer) is reused as
//! the self-describing payload of the replicated write command — see
//! [`Needle::encode_payload`]/[`Needle::decode_payload`].

use std::fs::File;
use std::io::{self, Read, Write};

use haystack_types::{crc32, Cookie, PADDING_BLOCK};

use crate::error::{StorageError, StorageResult};

/// Size of the fixed header: Cookie(4) + Offset(8) + Size(4).
pub const HEADER_SIZE: u32 = 16;
/// Size of the trailing CRC32 checksum.
pub const CHECKSUM_SIZE: u32 = 4;
/// Number of low-order bytes used to encode `LastModified`.
pub const LAST_MODIFIED_SIZE: usize = 5;

pub const FLAG_GZIP: u8 = 0x01;
pub const FLAG_HAS_NAME: u8 = 0x02;
pub const FLAG_HAS_MIME: u8 = 0x04;
pub const FLAG_HAS_LAST_MODIFIED: u8 = 0x08;

/// A single stored blob plus its metadata.
///
/// `offset` and `size` are populated by [`crate::Volume::write`] (offset)
/// and by construction (size); callers building a fresh needle for upload
/// never set them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    pub cookie: Cookie,
    pub offset: u64,
    pub size: u32,
    pub data_size: u32,
    pub data: Vec<u8>,
    pub flags: u8,
    pub name: Option<Vec<u8>>,
    pub mime: Option<Vec<u8>>,
    /// Unix seconds, truncated to the low 5 bytes on the wire.
    pub last_modified: Option<u64>,
    pub checksum: u32,
}

impl Needle {
    /// Builds a fresh needle from its data and cookie. `offset` is zero
    /// until a volume assigns it on write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EmptyData`] if `data` is empty — a needle
    /// with no data is only legal as the tombstone produced by
    /// [`Self::tombstone`].
    pub fn new(cookie: Cookie, data: Vec<u8>) -> StorageResult<Self> {
        if data.is_empty() {
            return Err(StorageError::EmptyData);
        }
        let checksum = crc32(&data);
        let data_size = data.len() as u32;
        let mut needle = Self {
            cookie,
            offset: 0,
            size: 0,
            data_size,
            data,
            flags: 0,
            name: None,
            mime: None,
            last_modified: None,
            checksum,
        };
        needle.recompute_size();
        Ok(needle)
    }

    /// Builds a delete tombstone: a needle with empty data. Legal only as
    /// the payload appended by [`crate::Volume::delete`].
    pub fn tombstone(cookie: Cookie) -> Self {
        Self {
            cookie,
            offset: 0,
            size: 0,
            data_size: 0,
            data: Vec::new(),
            flags: 0,
            name: None,
            mime: None,
            last_modified: None,
            checksum: crc32(&[]),
        }
    }

    pub fn with_name(mut self, name: Vec<u8>) -> Self {
        self.flags |= FLAG_HAS_NAME;
        self.name = Some(name);
        self.recompute_size();
        self
    }

    pub fn with_mime(mut self, mime: Vec<u8>) -> Self {
        self.flags |= FLAG_HAS_MIME;
        self.mime = Some(mime);
        self.recompute_size();
        self
    }

    pub fn with_last_modified(mut self, unix_seconds: u64) -> Self {
        self.flags |= FLAG_HAS_LAST_MODIFIED;
        self.last_modified = Some(unix_seconds);
        self.recompute_size();
        self
    }

    pub fn set_gzipped(&mut self) {
        self.flags |= FLAG_GZIP;
    }

    pub fn is_gzipped(&self) -> bool {
        self.flags & FLAG_GZIP != 0
    }

    pub fn has_name(&self) -> bool {
        self.flags & FLAG_HAS_NAME != 0
    }

    pub fn has_mime(&self) -> bool {
        self.flags & FLAG_HAS_MIME != 0
    }

    pub fn has_last_modified(&self) -> bool {
        self.flags & FLAG_HAS_LAST_MODIFIED != 0
    }

    pub fn is_tombstone(&self) -> bool {
        self.data_size == 0
    }

    /// `Size` per the on-disk format: `DataSize` field + data + flags byte
    /// + any present optional sections. Excludes the 16-byte header, the
    /// checksum, and padding.
    fn recompute_size(&mut self) {
        let mut size = 4 + self.data_size + 1;
        if let Some(name) = &self.name {
            size += 1 + name.len() as u32;
        }
        if let Some(mime) = &self.mime {
            size += 1 + mime.len() as u32;
        }
        if self.last_modified.is_some() {
            size += LAST_MODIFIED_SIZE as u32;
        }
        self.size = size;
    }

    /// Total on-disk footprint: header + size + checksum + padding.
    pub fn disk_size(&self) -> u64 {
        let unpadded = u64::from(HEADER_SIZE) + u64::from(self.size) + u64::from(CHECKSUM_SIZE);
        unpadded + padding_len(unpadded)
    }

    /// Serializes this needle to its on-disk representation. `offset` must
    /// already be set by the caller (the volume, at append time).
    fn to_disk_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.disk_size() as usize);
        buf.extend_from_slice(&self.cookie.to_be_bytes());
        buf.extend_from_slice(&self.offset.to_be_bytes());
        buf.extend_from_slice(&self.size.to_be_bytes());
        encode_fields(self, &mut buf);
        let checksum = crc32(&self.data);
        buf.extend_from_slice(&checksum.to_be_bytes());
        let padding = padding_len(buf.len() as u64);
        buf.extend(std::iter::repeat(0u8).take(padding as usize));
        buf
    }

    /// Appends this needle to `file` at the file's current position, which
    /// must already be 8-byte aligned (the volume is responsible for
    /// seeking there and for setting `offset` before calling this).
    ///
    /// On a write failure the needle's bytes may be partially on disk; the
    /// caller (the volume) is responsible for truncating the file back to
    /// its pre-append length.
    pub fn append_to(&self, file: &mut File) -> StorageResult<()> {
        if self.data_size == 0 && !self.is_tombstone() {
            return Err(StorageError::EmptyData);
        }
        file.write_all(&self.to_disk_bytes())?;
        Ok(())
    }

    /// Reads a needle at the file's current position (already seeked to
    /// `offset * PADDING_BLOCK` by the caller), verifying it against the
    /// requested `(size, cookie)` and its own checksum.
    pub fn read_from(file: &mut File, expected_size: u32, expected_cookie: Cookie) -> StorageResult<Self> {
        let mut header = [0u8; HEADER_SIZE as usize];
        read_exact_or_not_found(file, &mut header)?;

        let cookie = u32::from_be_bytes(header[0..4].try_into().expect("4 bytes"));
        let offset = u64::from_be_bytes(header[4..12].try_into().expect("8 bytes"));
        let size = u32::from_be_bytes(header[12..16].try_into().expect("4 bytes"));

        if size != expected_size || cookie != expected_cookie {
            return Err(StorageError::CapabilityMismatch);
        }

        let mut body = vec![0u8; size as usize + CHECKSUM_SIZE as usize];
        read_exact_or_not_found(file, &mut body)?;

        let (consumed, data_size, data, flags, name, mime, last_modified) = decode_fields(&body[..size as usize])?;
        debug_assert_eq!(consumed, size as usize, "decoded fewer/more bytes than Size declared");

        let stored_checksum =
            u32::from_be_bytes(body[size as usize..size as usize + 4].try_into().expect("4 bytes"));
        let computed_checksum = crc32(&data);
        if stored_checksum != computed_checksum {
            return Err(StorageError::Corruption);
        }

        Ok(Needle {
            cookie,
            offset,
            size,
            data_size,
            data,
            flags,
            name,
            mime,
            last_modified,
            checksum: stored_checksum,
        })
    }

    /// Lower-level primitive: reads only the fixed header at the file's
    /// current position and returns `(cookie, offset, size, body_length)`
    /// where `body_length = size + checksum + padding`. Intended for
    /// forward-scan tooling (an index rebuilder) that needs to walk a
    /// volume without decoding every field.
    pub fn read_header_only(file: &mut File) -> StorageResult<(Cookie, u64, u32, u64)> {
        let mut header = [0u8; HEADER_SIZE as usize];
        read_exact_or_not_found(file, &mut header)?;
        let cookie = u32::from_be_bytes(header[0..4].try_into().expect("4 bytes"));
        let offset = u64::from_be_bytes(header[4..12].try_into().expect("8 bytes"));
        let size = u32::from_be_bytes(header[12..16].try_into().expect("4 bytes"));
        let unpadded = u64::from(size) + u64::from(CHECKSUM_SIZE);
        let body_length = unpadded + padding_len(u64::from(HEADER_SIZE) + unpadded);
        Ok((cookie, offset, size, body_length))
    }

    /// Encodes this needle as the self-describing payload carried by the
    /// replicated write command: every field except `Offset` and `Size`
    /// (those are positional, assigned by the volume that applies the
    /// write). Layout: `Cookie(4) || fields || Checksum(4)`.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.size as usize);
        buf.extend_from_slice(&self.cookie.to_be_bytes());
        encode_fields(self, &mut buf);
        buf.extend_from_slice(&crc32(&self.data).to_be_bytes());
        buf
    }

    /// Decodes a payload produced by [`Self::encode_payload`]. Verifies
    /// the trailing checksum against `crc32(Data)`.
    pub fn decode_payload(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() < 4 {
            return Err(StorageError::NotFound);
        }
        let cookie = u32::from_be_bytes(bytes[0..4].try_into().expect("4 bytes"));
        let (consumed, data_size, data, flags, name, mime, last_modified) = decode_fields(&bytes[4..])?;
        let checksum_start = 4 + consumed;
        if bytes.len() < checksum_start + 4 {
            return Err(StorageError::NotFound);
        }
        let stored_checksum = u32::from_be_bytes(
            bytes[checksum_start..checksum_start + 4]
                .try_into()
                .expect("4 bytes"),
        );
        if stored_checksum != crc32(&data) {
            return Err(StorageError::Corruption);
        }

        let mut needle = Needle {
            cookie,
            offset: 0,
            size: 0,
            data_size,
            data,
            flags,
            name,
            mime,
            last_modified,
            checksum: stored_checksum,
        };
        needle.recompute_size();
        Ok(needle)
    }
}

/// `P = (-(unpadded)) mod PADDING_BLOCK`, computed without relying on
/// signed arithmetic.
fn padding_len(unpadded: u64) -> u64 {
    let rem = unpadded % PADDING_BLOCK;
    if rem == 0 {
        0
    } else {
        PADDING_BLOCK - rem
    }
}

/// Encodes `DataSize || Data || Flags || [NameSize || Name] || [MimeSize
/// || Mime] || [LastModified]` — the field set shared by the on-disk body
/// and the replicated-command payload.
fn encode_fields(needle: &Needle, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&needle.data_size.to_be_bytes());
    buf.extend_from_slice(&needle.data);
    buf.push(needle.flags);
    if let Some(name) = &needle.name {
        buf.push(name.len() as u8);
        buf.extend_from_slice(name);
    }
    if let Some(mime) = &needle.mime {
        buf.push(mime.len() as u8);
        buf.extend_from_slice(mime);
    }
    if let Some(last_modified) = needle.last_modified {
        let full = last_modified.to_be_bytes();
        buf.extend_from_slice(&full[3..8]);
    }
}

type DecodedFields = (usize, u32, Vec<u8>, u8, Option<Vec<u8>>, Option<Vec<u8>>, Option<u64>);

/// Inverse of [`encode_fields`]. Returns the number of bytes consumed
/// alongside the decoded fields.
fn decode_fields(bytes: &[u8]) -> StorageResult<DecodedFields> {
    let mut idx = 0usize;
    let take = |idx: &mut usize, n: usize| -> StorageResult<std::ops::Range<usize>> {
        let end = idx.checked_add(n).ok_or(StorageError::NotFound)?;
        if end > bytes.len() {
            return Err(StorageError::NotFound);
        }
        let range = *idx..end;
        *idx = end;
        Ok(range)
    };

    let data_size = u32::from_be_bytes(bytes[take(&mut idx, 4)?].try_into().expect("4 bytes"));
    let data = bytes[take(&mut idx, data_size as usize)?].to_vec();
    let flags = bytes[take(&mut idx, 1)?][0];

    let mut name = None;
    if flags & FLAG_HAS_NAME != 0 {
        let name_size = bytes[take(&mut idx, 1)?][0] as usize;
        name = Some(bytes[take(&mut idx, name_size)?].to_vec());
    }

    let mut mime = None;
    if flags & FLAG_HAS_MIME != 0 {
        let mime_size = bytes[take(&mut idx, 1)?][0] as usize;
        mime = Some(bytes[take(&mut idx, mime_size)?].to_vec());
    }

    let mut last_modified = None;
    if flags & FLAG_HAS_LAST_MODIFIED != 0 {
        let range = take(&mut idx, LAST_MODIFIED_SIZE)?;
        let mut full = [0u8; 8];
        full[3..8].copy_from_slice(&bytes[range]);
        last_modified = Some(u64::from_be_bytes(full));
    }

    Ok((idx, data_size, data, flags, name, mime, last_modified))
}

fn read_exact_or_not_found(file: &mut File, buf: &mut [u8]) -> StorageResult<()> {
    match file.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(StorageError::NotFound),
        Err(e) => Err(StorageError::Io(e)),
    }
}
