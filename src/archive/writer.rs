use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use tracing::debug;

use super::codec::{
    self, CDFH_SIGNATURE, COMPRESSION_DEFLATE, COMPRESSION_STORED, EOCD_SIGNATURE,
    FLAG_DATA_DESCRIPTOR, FLAG_UTF8, HOST_DOS, HOST_UNIX, LOCAL_HEADER_SIGNATURE, VERSION_NEEDED,
};
use super::entry::{Entry, EntryData};
use super::{Archive, EntryMetadata};
use crate::error::{Error, Result};

/// Accumulates entries and encodes them into a new ZIP archive.
///
/// Appending a path that is already held replaces the earlier entry but
/// keeps its position.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    archive: Archive,
}

/// Header fields for one entry, worked out before anything is written.
struct EncodedEntry<'a> {
    name: Cow<'a, [u8]>,
    comment: Cow<'a, [u8]>,
    version_needed: u16,
    flags: u16,
    method: u16,
    crc32: u32,
    uncompressed_size: u64,
    version_made_by: u16,
    external_attributes: u32,
    payload: Cow<'a, [u8]>,
    metadata: &'a EntryMetadata,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing archive. Its entries stay compressed and are
    /// written back out byte for byte.
    pub fn from_archive(archive: Archive) -> Self {
        ArchiveWriter { archive }
    }

    /// Add a file (or, for a path ending in `/`, a directory marker).
    /// Returns `true` when an entry with the same path was replaced.
    pub fn append(
        &mut self,
        path: impl Into<String>,
        content: Bytes,
        metadata: EntryMetadata,
    ) -> bool {
        self.push(Entry::file(path, content, metadata))
    }

    /// Add a prepared entry, e.g. one copied from a parsed archive.
    pub fn push(&mut self, entry: Entry) -> bool {
        debug!(path = entry.path(), size = entry.size(), "Appending entry");
        self.archive.insert(entry)
    }

    /// Add `entry` under a different path, keeping its content and metadata.
    pub fn push_as(&mut self, path: impl Into<String>, entry: Entry) -> bool {
        self.push(entry.with_path(path.into()))
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.archive.set_comment(Some(comment.into()).filter(|c| !c.is_empty()));
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.archive.paths()
    }

    /// Encode every held entry into a ZIP archive.
    ///
    /// Output is deterministic: the same entries always produce the same
    /// bytes. ZIP64 is never written, and the all-ones field values are
    /// reserved as ZIP64 markers, so 65535 or more entries, or any size or
    /// offset of 4 GiB - 1 or more, fails with [`Error::Serialization`].
    pub fn serialize(&self) -> Result<Bytes> {
        if self.archive.len() >= u16::MAX as usize {
            return Err(Error::serialization(format!(
                "{} entries exceeds the {} entry limit",
                self.archive.len(),
                u16::MAX - 1
            )));
        }

        let encoded = self
            .archive
            .entries()
            .map(encode_entry)
            .collect::<Result<Vec<_>>>()?;

        let mut out = BytesMut::new();
        let mut offsets = Vec::with_capacity(encoded.len());

        for entry in &encoded {
            offsets.push(checked_u32(out.len() as u64, "local header offset")?);
            write_local_header(&mut out, entry)?;
            out.put_slice(&entry.payload);
        }

        let cd_offset = checked_u32(out.len() as u64, "central directory offset")?;
        for (entry, offset) in encoded.iter().zip(offsets) {
            write_central_header(&mut out, entry, offset)?;
        }
        let cd_size = checked_u32(out.len() as u64 - cd_offset as u64, "central directory size")?;

        let comment = self.archive.comment().unwrap_or_default().as_bytes();
        let comment_len = checked_u16(comment.len(), "archive comment")?;

        out.put_slice(&EOCD_SIGNATURE);
        out.put_u16_le(0); // this disk
        out.put_u16_le(0); // disk with central directory
        out.put_u16_le(encoded.len() as u16);
        out.put_u16_le(encoded.len() as u16);
        out.put_u32_le(cd_size);
        out.put_u32_le(cd_offset);
        out.put_u16_le(comment_len);
        out.put_slice(comment);

        Ok(out.freeze())
    }
}

fn checked_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&value| value != u32::MAX)
        .ok_or_else(|| Error::serialization(format!("{what} {value} requires ZIP64")))
}

fn checked_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| Error::serialization(format!("{what} is {len} bytes, limit is {}", u16::MAX)))
}

/// One byte per char, if every char fits.
fn single_byte(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}

/// Name and comment bytes plus the UTF-8 flag they need.
///
/// Text read from an entry without the UTF-8 flag goes back out in its
/// original single-byte form, so a copy keeps the source's name bytes.
fn encode_text(entry: &Entry) -> (Cow<'_, [u8]>, Cow<'_, [u8]>, u16) {
    let path = entry.path();
    let comment = entry.metadata().comment.as_deref().unwrap_or_default();

    if path.is_ascii() && comment.is_ascii() {
        return (path.as_bytes().into(), comment.as_bytes().into(), 0);
    }
    if entry.legacy_text() {
        if let (Some(name), Some(comment)) = (single_byte(path), single_byte(comment)) {
            return (name.into(), comment.into(), 0);
        }
    }
    (path.as_bytes().into(), comment.as_bytes().into(), FLAG_UTF8)
}

fn encode_entry(entry: &Entry) -> Result<EncodedEntry<'_>> {
    let metadata = entry.metadata();
    let (name, comment, utf8) = encode_text(entry);

    let (version_needed, flags, method, crc32, uncompressed_size, payload) = match entry.data() {
        EntryData::Directory => (
            VERSION_NEEDED,
            utf8,
            COMPRESSION_STORED,
            0,
            0,
            Cow::Borrowed(&[][..]),
        ),
        EntryData::Raw(content) if content.is_empty() => (
            VERSION_NEEDED,
            utf8,
            COMPRESSION_STORED,
            0,
            0,
            Cow::Borrowed(&[][..]),
        ),
        EntryData::Raw(content) => (
            VERSION_NEEDED,
            utf8,
            COMPRESSION_DEFLATE,
            crc32fast::hash(content),
            content.len() as u64,
            Cow::Owned(codec::deflate(entry.path(), content)?),
        ),
        // Sizes go in the local header, so the source's data descriptor is dropped.
        // The payload is untouched, so its features still need the source's version.
        EntryData::Compressed(data) => (
            data.version_needed.max(VERSION_NEEDED),
            (data.flags & !(FLAG_DATA_DESCRIPTOR | FLAG_UTF8)) | utf8,
            data.method,
            data.crc32,
            data.uncompressed_size,
            Cow::Borrowed(&data.payload[..]),
        ),
    };

    let (host, high) = match metadata.unix_permissions {
        Some(mode) => (HOST_UNIX, mode << 16),
        None => (HOST_DOS, 0),
    };
    let external_attributes = high | metadata.dos_permissions.unwrap_or(0) as u32;

    Ok(EncodedEntry {
        name,
        comment,
        version_needed,
        flags,
        method,
        crc32,
        uncompressed_size,
        version_made_by: (host << 8) | (version_needed & 0xFF),
        external_attributes,
        payload,
        metadata,
    })
}

fn write_local_header(out: &mut BytesMut, entry: &EncodedEntry<'_>) -> Result<()> {
    let name_len = checked_u16(entry.name.len(), "entry name")?;
    let compressed_size = checked_u32(entry.payload.len() as u64, "compressed size")?;
    let uncompressed_size = checked_u32(entry.uncompressed_size, "uncompressed size")?;

    out.put_slice(&LOCAL_HEADER_SIGNATURE);
    out.put_u16_le(entry.version_needed);
    out.put_u16_le(entry.flags);
    out.put_u16_le(entry.method);
    out.put_u16_le(entry.metadata.modified.time());
    out.put_u16_le(entry.metadata.modified.date());
    out.put_u32_le(entry.crc32);
    out.put_u32_le(compressed_size);
    out.put_u32_le(uncompressed_size);
    out.put_u16_le(name_len);
    out.put_u16_le(0); // extra field length
    out.put_slice(&entry.name);
    Ok(())
}

fn write_central_header(out: &mut BytesMut, entry: &EncodedEntry<'_>, offset: u32) -> Result<()> {
    let name_len = checked_u16(entry.name.len(), "entry name")?;
    let comment_len = checked_u16(entry.comment.len(), "entry comment")?;

    out.put_slice(&CDFH_SIGNATURE);
    out.put_u16_le(entry.version_made_by);
    out.put_u16_le(entry.version_needed);
    out.put_u16_le(entry.flags);
    out.put_u16_le(entry.method);
    out.put_u16_le(entry.metadata.modified.time());
    out.put_u16_le(entry.metadata.modified.date());
    out.put_u32_le(entry.crc32);
    // Both sizes were range-checked by the local header.
    out.put_u32_le(entry.payload.len() as u32);
    out.put_u32_le(entry.uncompressed_size as u32);
    out.put_u16_le(name_len);
    out.put_u16_le(0); // extra field length
    out.put_u16_le(comment_len);
    out.put_u16_le(0); // disk number start
    out.put_u16_le(0); // internal attributes
    out.put_u32_le(entry.external_attributes);
    out.put_u32_le(offset);
    out.put_slice(&entry.name);
    out.put_slice(&entry.comment);
    Ok(())
}
