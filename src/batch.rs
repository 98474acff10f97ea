//! Per-file outcomes of a batch conversion.

use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// Map from each discovered input file to its conversion outcome, sorted by
/// input path.
#[derive(Debug, Default)]
pub struct BatchResult {
    entries: BTreeMap<PathBuf, Result<PathBuf, ConvertError>>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: PathBuf, outcome: Result<PathBuf, ConvertError>) {
        self.entries.insert(input, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, input: &Path) -> Option<&Result<PathBuf, ConvertError>> {
        self.entries.get(input)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, Result<PathBuf, ConvertError>> {
        self.entries.iter()
    }

    /// `(input, output)` for every converted file.
    pub fn successes(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries
            .iter()
            .filter_map(|(input, r)| r.as_ref().ok().map(|out| (input.as_path(), out.as_path())))
    }

    /// `(input, error)` for every failed file.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &ConvertError)> {
        self.entries
            .iter()
            .filter_map(|(input, r)| r.as_ref().err().map(|e| (input.as_path(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn error_count(&self) -> usize {
        self.failures().count()
    }

    /// Whether every file converted. An empty batch counts as a success.
    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }
}

impl FromIterator<(PathBuf, Result<PathBuf, ConvertError>)> for BatchResult {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Result<PathBuf, ConvertError>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for BatchResult {
    type Item = (PathBuf, Result<PathBuf, ConvertError>);
    type IntoIter = btree_map::IntoIter<PathBuf, Result<PathBuf, ConvertError>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = (&'a PathBuf, &'a Result<PathBuf, ConvertError>);
    type IntoIter = btree_map::Iter<'a, PathBuf, Result<PathBuf, ConvertError>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
