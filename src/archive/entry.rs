use bytes::Bytes;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::codec;
use crate::error::Result;

/// A date and time in the MS-DOS representation stored in ZIP headers.
///
/// The raw words are kept as read so a copied entry is written back with
/// exactly the same timestamp, even when the stored value is not a valid
/// calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    date: u16,
    time: u16,
}

impl DosDateTime {
    /// Build from the raw `(date, time)` header words.
    pub const fn from_raw(date: u16, time: u16) -> Self {
        DosDateTime { date, time }
    }

    pub fn date(&self) -> u16 {
        self.date
    }

    pub fn time(&self) -> u16 {
        self.time
    }

    pub fn year(&self) -> i32 {
        (((self.date & 0xFE00) >> 9) + 1980).into()
    }

    pub fn month(&self) -> u32 {
        ((self.date & 0x1E0) >> 5).into()
    }

    pub fn day(&self) -> u32 {
        (self.date & 0x1F).into()
    }

    pub fn hour(&self) -> u32 {
        ((self.time & 0xF800) >> 11).into()
    }

    pub fn minute(&self) -> u32 {
        ((self.time & 0x7E0) >> 5).into()
    }

    /// MS-DOS only has two-second granularity.
    pub fn second(&self) -> u32 {
        ((self.time & 0x1F) << 1).into()
    }

    /// Convert to a chrono timestamp. Returns `None` for stored values that
    /// are not a real date (month 0, day 31 of February, ...).
    pub fn to_chrono(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year(), self.month(), self.day())?.and_hms_opt(
            self.hour(),
            self.minute(),
            self.second(),
        )
    }

    /// Convert from a chrono timestamp, clamping the year into the
    /// 1980..=2107 range the format can represent.
    pub fn from_chrono(value: &NaiveDateTime) -> Self {
        let year = value.year().clamp(1980, 2107) as u16;
        let date = ((year - 1980) << 9) | ((value.month() as u16) << 5) | value.day() as u16;
        let time = ((value.hour() as u16) << 11)
            | ((value.minute() as u16) << 5)
            | (value.second() as u16 >> 1);
        DosDateTime { date, time }
    }

    /// The current local time.
    pub fn now() -> Self {
        Self::from_chrono(&chrono::Local::now().naive_local())
    }
}

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    fn default() -> Self {
        DosDateTime::from_raw(0x0021, 0)
    }
}

impl std::fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_chrono() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "invalid({:#06x},{:#06x})", self.date, self.time),
        }
    }
}

/// Filesystem-style metadata carried by every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub modified: DosDateTime,
    /// Unix mode bits, present when the entry was written on a Unix host.
    pub unix_permissions: Option<u32>,
    /// The MS-DOS attribute byte (read-only, hidden, directory, ...).
    pub dos_permissions: Option<u8>,
    pub comment: Option<String>,
}

impl EntryMetadata {
    pub fn modified(mut self, modified: DosDateTime) -> Self {
        self.modified = modified;
        self
    }

    pub fn unix_permissions(mut self, mode: u32) -> Self {
        self.unix_permissions = Some(mode);
        self
    }

    pub fn dos_permissions(mut self, attributes: u8) -> Self {
        self.dos_permissions = Some(attributes);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Values the ZIP format cannot tell apart from "absent" collapse to `None`.
    fn normalized(mut self) -> Self {
        self.unix_permissions = self.unix_permissions.map(|mode| mode & 0xFFFF);
        self.dos_permissions = self.dos_permissions.filter(|attrs| *attrs != 0);
        self.comment = self.comment.filter(|comment| !comment.is_empty());
        self
    }
}

/// A compressed payload sliced out of a parsed archive.
#[derive(Debug, Clone)]
pub(crate) struct CompressedData {
    pub version_needed: u16,
    pub method: u16,
    pub flags: u16,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
pub(crate) enum EntryData {
    Directory,
    /// Uncompressed content handed to a writer.
    Raw(Bytes),
    /// Content still in the source's encoding; inflated on demand.
    Compressed(CompressedData),
}

/// One file or directory marker inside an [`Archive`](super::Archive).
#[derive(Debug, Clone)]
pub struct Entry {
    path: String,
    metadata: EntryMetadata,
    data: EntryData,
    /// Name and comment were stored without the UTF-8 flag, one byte per char.
    legacy_text: bool,
}

impl Entry {
    /// A file entry holding `content` uncompressed. A path ending in `/`
    /// becomes a directory marker and `content` is dropped.
    pub fn file(path: impl Into<String>, content: Bytes, metadata: EntryMetadata) -> Self {
        let path = path.into();
        let data = if path.ends_with('/') {
            EntryData::Directory
        } else {
            EntryData::Raw(content)
        };
        Entry {
            path,
            metadata: metadata.normalized(),
            data,
            legacy_text: false,
        }
    }

    /// A directory marker. A trailing `/` is added when missing.
    pub fn directory(path: impl Into<String>, metadata: EntryMetadata) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Entry {
            path,
            metadata: metadata.normalized(),
            data: EntryData::Directory,
            legacy_text: false,
        }
    }

    pub(crate) fn from_parts(
        path: String,
        metadata: EntryMetadata,
        data: EntryData,
        legacy_text: bool,
    ) -> Self {
        Entry {
            path,
            metadata: metadata.normalized(),
            data,
            legacy_text,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.data, EntryData::Directory)
    }

    /// Uncompressed size in bytes, as recorded (directory markers are 0).
    pub fn size(&self) -> u64 {
        match &self.data {
            EntryData::Directory => 0,
            EntryData::Raw(content) => content.len() as u64,
            EntryData::Compressed(data) => data.uncompressed_size,
        }
    }

    /// The entry's bytes, inflated and checksum-verified if they came from a
    /// parsed archive. Directory markers yield an empty buffer.
    ///
    /// Content inflated from a parsed archive is a fresh buffer. Content
    /// handed to [`Entry::file`] is returned as a cheap `Bytes` clone of
    /// that same buffer.
    pub fn content(&self) -> Result<Bytes> {
        match &self.data {
            EntryData::Directory => Ok(Bytes::new()),
            EntryData::Raw(content) => Ok(content.clone()),
            EntryData::Compressed(data) => codec::inflate(&self.path, data),
        }
    }

    /// A copy holding the content uncompressed and checksum-verified, with
    /// the same path, metadata and on-disk name encoding.
    pub fn decompressed(&self) -> Result<Entry> {
        let data = match &self.data {
            EntryData::Directory => EntryData::Directory,
            _ => EntryData::Raw(self.content()?),
        };
        Ok(Entry {
            path: self.path.clone(),
            metadata: self.metadata.clone(),
            data,
            legacy_text: self.legacy_text,
        })
    }

    pub(crate) fn data(&self) -> &EntryData {
        &self.data
    }

    pub(crate) fn legacy_text(&self) -> bool {
        self.legacy_text
    }

    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}
