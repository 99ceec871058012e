use bytes::Bytes;
use tracing::debug;

use super::codec::{
    CDFH_MIN_SIZE, CDFH_SIGNATURE, EOCD_SIGNATURE, FLAG_UTF8, HOST_UNIX, LOCAL_HEADER_MIN_SIZE,
    LOCAL_HEADER_SIGNATURE, MIN_EOCD_SIZE,
};
use super::entry::{CompressedData, DosDateTime, Entry, EntryData, EntryMetadata};
use super::Archive;
use crate::error::{Error, Result};

/// The EOCD sits in the last 22 bytes plus an optional comment of up to 64KB.
const EOCD_SEARCH_SIZE: usize = MIN_EOCD_SIZE + u16::MAX as usize;

/// Information extracted from the End of Central Directory record
#[derive(Debug)]
struct EocdInfo {
    total_entries: u16,
    central_dir_offset: u64,
    central_dir_size: u64,
    comment: String,
}

/// One central directory file header, decoded.
#[derive(Debug)]
struct CentralRecord {
    path: String,
    version_made_by: u16,
    version_needed: u16,
    flags: u16,
    compression_method: u16,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    external_attributes: u32,
    local_header_offset: u64,
    comment: String,
}

fn u16_at(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Parse a whole ZIP archive held in memory. Only headers are decoded;
/// every entry keeps a slice of its compressed payload.
pub(super) fn parse(data: Bytes) -> Result<Archive> {
    if data.len() < MIN_EOCD_SIZE {
        return Err(Error::corrupt("file too small to be a valid ZIP archive"));
    }

    let tail_start = data.len().saturating_sub(EOCD_SEARCH_SIZE);
    let eocd = find_eocd(&data[tail_start..])?;

    let cd_end = eocd
        .central_dir_offset
        .checked_add(eocd.central_dir_size)
        .ok_or_else(|| Error::corrupt("central directory bounds overflow"))?;

    if cd_end > data.len() as u64 {
        return Err(Error::corrupt(format!(
            "central directory extends beyond file bounds (offset {} + size {} > file size {})",
            eocd.central_dir_offset,
            eocd.central_dir_size,
            data.len()
        )));
    }

    let central_dir = &data[eocd.central_dir_offset as usize..cd_end as usize];
    let records = parse_central_directory(central_dir, data.len() as u64)?;

    if records.len() != eocd.total_entries as usize {
        return Err(Error::corrupt(format!(
            "truncated central directory: found {} entries, expected {}",
            records.len(),
            eocd.total_entries
        )));
    }

    let mut archive = Archive::default();
    archive.set_comment(Some(eocd.comment).filter(|c| !c.is_empty()));

    for record in records {
        let entry = build_entry(&data, record)?;
        debug!(path = entry.path(), size = entry.size(), "Indexed entry");
        archive.insert(entry);
    }

    Ok(archive)
}

/// Find the End of Central Directory record in the buffer.
/// Returns information about the central directory location.
fn find_eocd(data: &[u8]) -> Result<EocdInfo> {
    // Search backwards from the end for the EOCD signature
    for i in (0..=data.len().saturating_sub(MIN_EOCD_SIZE)).rev() {
        if !data[i..].starts_with(&EOCD_SIGNATURE) {
            continue;
        }

        let eocd = &data[i..];
        if eocd.len() < MIN_EOCD_SIZE {
            continue;
        }

        // A signature inside someone else's comment is not ours: the declared
        // comment must fit in what is left of the file.
        let comment_len = u16_at(eocd, 20) as usize;
        if MIN_EOCD_SIZE + comment_len > eocd.len() {
            continue;
        }

        // Disk number (offset 4) and disk with CD start (offset 6)
        let disk_number = u16_at(eocd, 4);
        let disk_with_cd = u16_at(eocd, 6);

        if disk_number != 0 || disk_with_cd != 0 {
            return Err(Error::corrupt(format!(
                "multi-disk ZIP archives are not supported (disk {}, CD disk {})",
                disk_number, disk_with_cd
            )));
        }

        let total_entries = u16_at(eocd, 10);
        let central_dir_size_raw = u32_at(eocd, 12);
        let central_dir_offset_raw = u32_at(eocd, 16);

        // ZIP64 uses 0xFFFFFFFF as a placeholder
        if central_dir_size_raw == u32::MAX
            || central_dir_offset_raw == u32::MAX
            || total_entries == u16::MAX
        {
            return Err(Error::corrupt(
                "ZIP64 archives are not supported (central directory fields use ZIP64 placeholder values)",
            ));
        }

        let comment_bytes = &eocd[MIN_EOCD_SIZE..MIN_EOCD_SIZE + comment_len];

        return Ok(EocdInfo {
            total_entries,
            central_dir_offset: central_dir_offset_raw as u64,
            central_dir_size: central_dir_size_raw as u64,
            comment: decode_text(comment_bytes, false),
        });
    }

    Err(Error::corrupt("could not find End of Central Directory record"))
}

/// Decode a filename or comment. Bit 11 marks UTF-8; anything else is a
/// legacy single-byte encoding where byte values are kept as chars.
fn decode_text(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Parse central directory file headers.
///
/// Central Directory File Header format (46 bytes fixed + variable):
/// - 4 bytes: signature (0x02014b50)
/// - 2 bytes: version made by
/// - 2 bytes: version needed to extract
/// - 2 bytes: general purpose bit flag
/// - 2 bytes: compression method
/// - 2 bytes: last mod file time
/// - 2 bytes: last mod file date
/// - 4 bytes: crc-32
/// - 4 bytes: compressed size
/// - 4 bytes: uncompressed size
/// - 2 bytes: file name length
/// - 2 bytes: extra field length
/// - 2 bytes: file comment length
/// - 2 bytes: disk number start
/// - 2 bytes: internal file attributes
/// - 4 bytes: external file attributes
/// - 4 bytes: relative offset of local header
/// - (variable): file name
/// - (variable): extra field
/// - (variable): file comment
fn parse_central_directory(data: &[u8], archive_size: u64) -> Result<Vec<CentralRecord>> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos + CDFH_MIN_SIZE <= data.len() {
        if !data[pos..].starts_with(&CDFH_SIGNATURE) {
            break;
        }

        let version_made_by = u16_at(data, pos + 4);
        let version_needed = u16_at(data, pos + 6);
        let flags = u16_at(data, pos + 8);
        let compression_method = u16_at(data, pos + 10);
        let modified = DosDateTime::from_raw(u16_at(data, pos + 14), u16_at(data, pos + 12));
        let crc32 = u32_at(data, pos + 16);
        let compressed_size_raw = u32_at(data, pos + 20);
        let uncompressed_size_raw = u32_at(data, pos + 24);
        let external_attributes = u32_at(data, pos + 38);
        let local_header_offset_raw = u32_at(data, pos + 42);

        if compressed_size_raw == u32::MAX
            || uncompressed_size_raw == u32::MAX
            || local_header_offset_raw == u32::MAX
        {
            return Err(Error::corrupt(
                "ZIP64 entries are not supported (entry uses ZIP64 placeholder values)",
            ));
        }

        let local_header_offset = local_header_offset_raw as u64;
        if local_header_offset >= archive_size {
            return Err(Error::corrupt(format!(
                "invalid local header offset {} for archive size {}",
                local_header_offset, archive_size
            )));
        }

        let filename_len = u16_at(data, pos + 28) as usize;
        let extra_len = u16_at(data, pos + 30) as usize;
        let comment_len = u16_at(data, pos + 32) as usize;

        // Lengths are u16, so the sum cannot overflow usize
        let end = pos + CDFH_MIN_SIZE + filename_len + extra_len + comment_len;
        if end > data.len() {
            return Err(Error::corrupt(format!(
                "truncated central directory entry at position {}",
                pos
            )));
        }

        let utf8 = flags & FLAG_UTF8 != 0;
        let name_start = pos + CDFH_MIN_SIZE;
        let comment_start = name_start + filename_len + extra_len;

        records.push(CentralRecord {
            path: decode_text(&data[name_start..name_start + filename_len], utf8),
            version_made_by,
            version_needed,
            flags,
            compression_method,
            modified,
            crc32,
            compressed_size: compressed_size_raw as u64,
            uncompressed_size: uncompressed_size_raw as u64,
            external_attributes,
            local_header_offset,
            comment: decode_text(&data[comment_start..end], utf8),
        });

        pos = end;
    }

    Ok(records)
}

/// Map the host-specific external attributes onto entry metadata.
fn metadata_for(record: &CentralRecord) -> EntryMetadata {
    let host = record.version_made_by >> 8;
    EntryMetadata {
        modified: record.modified,
        unix_permissions: (host == HOST_UNIX).then_some(record.external_attributes >> 16),
        dos_permissions: Some((record.external_attributes & 0xFF) as u8),
        comment: Some(record.comment.clone()),
    }
}

/// Resolve the record's local header and slice its payload out of `data`.
fn build_entry(data: &Bytes, record: CentralRecord) -> Result<Entry> {
    let metadata = metadata_for(&record);
    let legacy_text = record.flags & FLAG_UTF8 == 0;

    if record.path.ends_with('/') {
        return Ok(Entry::from_parts(
            record.path,
            metadata,
            EntryData::Directory,
            legacy_text,
        ));
    }

    let offset = record.local_header_offset as usize;
    let header_end = offset + LOCAL_HEADER_MIN_SIZE;
    if header_end > data.len() || !data[offset..].starts_with(&LOCAL_HEADER_SIGNATURE) {
        return Err(Error::corrupt(format!(
            "{}: invalid local file header signature at offset {}",
            record.path, offset
        )));
    }

    // The local header repeats the name and may carry a different extra field.
    let filename_len = u16_at(data, offset + 26) as usize;
    let extra_len = u16_at(data, offset + 28) as usize;
    let data_start = header_end + filename_len + extra_len;

    let data_end = (data_start as u64)
        .checked_add(record.compressed_size)
        .ok_or_else(|| Error::corrupt("data end calculation overflow"))?;

    if data_end > data.len() as u64 {
        return Err(Error::corrupt(format!(
            "{}: compressed data extends beyond file bounds (offset {} + size {} > file size {})",
            record.path,
            data_start,
            record.compressed_size,
            data.len()
        )));
    }

    let compressed = CompressedData {
        version_needed: record.version_needed,
        method: record.compression_method,
        flags: record.flags,
        crc32: record.crc32,
        uncompressed_size: record.uncompressed_size,
        payload: data.slice(data_start..data_end as usize),
    };

    Ok(Entry::from_parts(
        record.path,
        metadata,
        EntryData::Compressed(compressed),
        legacy_text,
    ))
}
