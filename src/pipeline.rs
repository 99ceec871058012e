//! The two archive transformations a job can run: pulling named entries out
//! of an archive, and grafting one archive into another under a prefix.

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::archive::{Archive, ArchiveWriter};
use crate::error::Result;
use crate::select::{self, Selection, SelectionRequest};

/// Output of [`extract`].
#[derive(Debug, Clone)]
pub struct Extracted {
    /// The new archive.
    pub bytes: Bytes,
    /// Paths copied into the new archive, in request order.
    pub copied: Vec<String>,
    /// Requested paths with no matching entry, in request order.
    pub unresolved: Vec<String>,
}

/// Output of [`merge`].
#[derive(Debug, Clone)]
pub struct Merged {
    pub bytes: Bytes,
    /// Destination paths of the grafted entries.
    pub grafted: Vec<String>,
}

/// Build a new archive holding the entries of `source` named in the
/// comma-separated `requested` list.
///
/// Entries are processed strictly in request order; the first one that fails
/// to inflate aborts the whole extraction. Names with no match are logged and
/// skipped.
pub fn extract(source: Bytes, requested: &str) -> Result<Extracted> {
    let request = SelectionRequest::parse(requested);
    let archive = Archive::parse(source)?;
    info!(
        entries = archive.len(),
        requested = request.len(),
        "Loaded source archive"
    );

    let mut writer = ArchiveWriter::new();
    let mut copied = Vec::new();
    let mut unresolved = Vec::new();

    for selection in select::resolve(&archive, &request) {
        match selection {
            Selection::Unresolved(path) => {
                warn!(path, "Unknown file, skipping");
                unresolved.push(path.to_string());
            }
            Selection::Resolved(entry) => {
                debug!(path = entry.path(), "Copying entry");
                writer.push(entry.decompressed()?);
                copied.push(entry.path().to_string());
            }
        }
    }

    let bytes = writer.serialize()?;
    info!(
        copied = copied.len(),
        skipped = unresolved.len(),
        size = bytes.len(),
        "Finished creating new archive"
    );

    Ok(Extracted {
        bytes,
        copied,
        unresolved,
    })
}

/// Copy every file of `graft` into `base` at `prefix + path`.
///
/// `prefix` is prepended verbatim, so include a trailing `/` to land under
/// a directory. Directory markers of `graft` are not copied. `base` entries
/// are written back unchanged; a grafted path that collides with one of
/// them replaces it.
pub fn merge(base: Bytes, graft: Bytes, prefix: &str) -> Result<Merged> {
    let base = Archive::parse(base)?;
    let graft = Archive::parse(graft)?;
    info!(
        base_entries = base.len(),
        graft_entries = graft.len(),
        prefix,
        "Loaded archives for merge"
    );

    let mut writer = ArchiveWriter::from_archive(base);
    let mut grafted = Vec::new();

    for entry in graft.entries().filter(|entry| !entry.is_dir()) {
        let path = format!("{prefix}{}", entry.path());
        debug!(from = entry.path(), to = %path, "Grafting entry");
        writer.push_as(path.clone(), entry.decompressed()?);
        grafted.push(path);
    }

    let bytes = writer.serialize()?;
    info!(
        grafted = grafted.len(),
        entries = writer.len(),
        size = bytes.len(),
        "Merge complete"
    );

    Ok(Merged { bytes, grafted })
}
