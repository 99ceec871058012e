//! Matching a requested path list against an archive's catalog.

use crate::archive::{Archive, Entry};

/// An ordered list of requested entry paths.
///
/// Order is preserved and duplicates are kept; each occurrence is resolved
/// on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRequest {
    paths: Vec<String>,
}

impl SelectionRequest {
    /// Split a comma-separated list, trim each element and drop empty ones.
    pub fn parse(csv: &str) -> Self {
        csv.split(',')
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .collect()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionRequest {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SelectionRequest {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The result of resolving one requested path.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    Resolved(&'a Entry),
    /// No entry has this exact path. Not an error; callers log and skip it.
    Unresolved(&'a str),
}

impl<'a> Selection<'a> {
    pub fn path(&self) -> &'a str {
        match *self {
            Selection::Resolved(entry) => entry.path(),
            Selection::Unresolved(path) => path,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Selection::Resolved(_))
    }
}

/// Resolve every requested path by exact, case-sensitive match, in request
/// order.
pub fn resolve<'a>(archive: &'a Archive, request: &'a SelectionRequest) -> Vec<Selection<'a>> {
    request
        .paths()
        .iter()
        .map(|path| match archive.get(path) {
            Some(entry) => Selection::Resolved(entry),
            None => Selection::Unresolved(path.as_str()),
        })
        .collect()
}
