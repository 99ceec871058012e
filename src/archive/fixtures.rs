//! Hand-assembled archives for header fields our writer never emits.

use bytes::{BufMut, Bytes, BytesMut};

use super::codec::{CDFH_SIGNATURE, EOCD_SIGNATURE, LOCAL_HEADER_SIGNATURE};

/// `0x82` followed by `.txt`, stored without the UTF-8 flag.
pub(crate) const LEGACY_NAME: &[u8] = b"\x82.txt";

/// A one-entry stored archive with flags 0, a DOS host and the given
/// version-needed value.
pub(crate) fn stored_entry(name: &[u8], version_needed: u16, content: &[u8]) -> Bytes {
    let crc32 = crc32fast::hash(content);
    let mut out = BytesMut::new();

    out.put_slice(&LOCAL_HEADER_SIGNATURE);
    out.put_u16_le(version_needed);
    out.put_u16_le(0); // flags
    out.put_u16_le(0); // stored
    out.put_u16_le(0); // time
    out.put_u16_le(0x0021); // 1980-01-01
    out.put_u32_le(crc32);
    out.put_u32_le(content.len() as u32);
    out.put_u32_le(content.len() as u32);
    out.put_u16_le(name.len() as u16);
    out.put_u16_le(0);
    out.put_slice(name);
    out.put_slice(content);

    let cd_offset = out.len() as u32;
    out.put_slice(&CDFH_SIGNATURE);
    out.put_u16_le(version_needed & 0xFF); // DOS host
    out.put_u16_le(version_needed);
    out.put_u16_le(0);
    out.put_u16_le(0);
    out.put_u16_le(0);
    out.put_u16_le(0x0021);
    out.put_u32_le(crc32);
    out.put_u32_le(content.len() as u32);
    out.put_u32_le(content.len() as u32);
    out.put_u16_le(name.len() as u16);
    out.put_u16_le(0); // extra
    out.put_u16_le(0); // comment
    out.put_u16_le(0); // disk
    out.put_u16_le(0); // internal attributes
    out.put_u32_le(0); // external attributes
    out.put_u32_le(0); // local header offset
    out.put_slice(name);
    let cd_size = out.len() as u32 - cd_offset;

    out.put_slice(&EOCD_SIGNATURE);
    out.put_u16_le(0);
    out.put_u16_le(0);
    out.put_u16_le(1);
    out.put_u16_le(1);
    out.put_u32_le(cd_size);
    out.put_u32_le(cd_offset);
    out.put_u16_le(0);

    out.freeze()
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// General purpose flags of the first local header.
pub(crate) fn local_flags(archive: &[u8]) -> u16 {
    u16::from_le_bytes([archive[6], archive[7]])
}

/// Version needed of the first local header.
pub(crate) fn local_version_needed(archive: &[u8]) -> u16 {
    u16::from_le_bytes([archive[4], archive[5]])
}

/// Version needed of the first central directory header.
pub(crate) fn central_version_needed(archive: &[u8]) -> u16 {
    let at = archive
        .windows(CDFH_SIGNATURE.len())
        .position(|window| window == CDFH_SIGNATURE.as_slice())
        .expect("central directory header");
    u16::from_le_bytes([archive[at + 6], archive[at + 7]])
}
