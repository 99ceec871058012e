//! ZIP record constants and the per-entry compression codecs.

use bytes::Bytes;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

use super::entry::CompressedData;
use crate::error::{Error, Result};

pub(crate) const LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
pub(crate) const CDFH_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
pub(crate) const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Local File Header minimum size (fixed portion)
pub(crate) const LOCAL_HEADER_MIN_SIZE: usize = 30;

/// Central Directory File Header minimum size (fixed portion)
pub(crate) const CDFH_MIN_SIZE: usize = 46;

/// Minimum size for EOCD (4 bytes signature + 18 bytes data)
pub(crate) const MIN_EOCD_SIZE: usize = 22;

pub(crate) const COMPRESSION_STORED: u16 = 0;
pub(crate) const COMPRESSION_DEFLATE: u16 = 8;

pub(crate) const FLAG_ENCRYPTED: u16 = 0x0001;
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub(crate) const FLAG_UTF8: u16 = 0x0800;

/// Version 2.0: deflate and directory entries.
pub(crate) const VERSION_NEEDED: u16 = 20;
pub(crate) const HOST_DOS: u16 = 0;
pub(crate) const HOST_UNIX: u16 = 3;

/// Maximum allowed decompressed size (1GB) to prevent zip bombs
const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum compression ratio allowed (1000:1) to detect zip bombs
const MAX_COMPRESSION_RATIO: u64 = 1000;

/// Inflate an entry's payload and verify its size and CRC-32.
pub(crate) fn inflate(path: &str, data: &CompressedData) -> Result<Bytes> {
    if data.flags & FLAG_ENCRYPTED != 0 {
        return Err(Error::corrupt(format!("{path}: encrypted entries are not supported")));
    }

    let compressed_size = data.payload.len() as u64;

    if data.uncompressed_size > MAX_DECOMPRESSED_SIZE {
        return Err(Error::corrupt(format!(
            "{path}: {} bytes exceeds the {} byte extraction limit",
            data.uncompressed_size, MAX_DECOMPRESSED_SIZE
        )));
    }

    if compressed_size > 0 && data.uncompressed_size / compressed_size > MAX_COMPRESSION_RATIO {
        return Err(Error::corrupt(format!(
            "{path}: suspicious compression ratio ({:.0}:1)",
            data.uncompressed_size as f64 / compressed_size as f64
        )));
    }

    let content = match data.method {
        COMPRESSION_STORED => {
            if compressed_size != data.uncompressed_size {
                return Err(Error::corrupt(format!(
                    "{path}: stored entry has mismatched sizes (compressed={}, uncompressed={})",
                    compressed_size, data.uncompressed_size
                )));
            }
            data.payload.to_vec()
        }
        COMPRESSION_DEFLATE => {
            // One byte past the expected size is enough to detect overruns.
            let mut decoder =
                DeflateDecoder::new(&data.payload[..]).take(data.uncompressed_size + 1);
            let mut content = Vec::with_capacity(data.uncompressed_size as usize);
            decoder
                .read_to_end(&mut content)
                .map_err(|e| Error::corrupt(format!("{path}: failed to inflate: {e}")))?;
            content
        }
        other => {
            return Err(Error::corrupt(format!(
                "{path}: unsupported compression method {other}, only stored (0) and deflate (8) are supported"
            )));
        }
    };

    if content.len() as u64 != data.uncompressed_size {
        return Err(Error::corrupt(format!(
            "{path}: inflated to {} bytes, expected {}",
            content.len(),
            data.uncompressed_size
        )));
    }

    let actual = crc32fast::hash(&content);
    if actual != data.crc32 {
        return Err(Error::corrupt(format!(
            "{path}: CRC-32 mismatch (expected {:#010x}, got {:#010x})",
            data.crc32, actual
        )));
    }

    Ok(Bytes::from(content))
}

/// Raw-deflate `content` at the default level.
pub(crate) fn deflate(path: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .and_then(|_| encoder.finish())
        .map_err(|e| Error::serialization(format!("{path}: failed to deflate: {e}")))
}
