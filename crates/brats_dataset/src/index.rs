//! Directory scanning and subject indexing.
//!
//! Leaf directories (no subdirectories) hold one subject each, with files named
//! like `BraTS2021_00002_seg.nii.gz`. The third `_`-separated token, cut at the
//! first `.`, names the channel.

use crate::types::{BratsDatasetError, DatasetResult, Mode, Modality, SubjectRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which file suffixes count as volumes during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionFilter {
    /// `.nii.gz` and plain `.nii`.
    #[default]
    NiftiAny,
    /// `.nii.gz` only.
    GzipOnly,
}

impl ExtensionFilter {
    pub fn accepts(&self, file_name: &str) -> bool {
        match self {
            ExtensionFilter::NiftiAny => {
                file_name.ends_with(".nii.gz") || file_name.ends_with(".nii")
            }
            ExtensionFilter::GzipOnly => file_name.ends_with(".nii.gz"),
        }
    }
}

/// Channel token of a file name, or `None` when it has fewer than three `_` tokens.
pub fn parse_channel(file_name: &str) -> Option<&str> {
    file_name.split('_').nth(2).and_then(|t| t.split('.').next())
}

/// Anomaly observed while scanning; none of these abort the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexDiagnostic {
    UnparsableFilename {
        dir: PathBuf,
        file: String,
    },
    IncompleteSubject {
        dir: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
        files: Vec<String>,
    },
    UnreadableDir {
        dir: PathBuf,
        msg: String,
    },
}

impl IndexDiagnostic {
    pub fn dir(&self) -> &Path {
        match self {
            IndexDiagnostic::UnparsableFilename { dir, .. }
            | IndexDiagnostic::IncompleteSubject { dir, .. }
            | IndexDiagnostic::UnreadableDir { dir, .. } => dir,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub root: PathBuf,
    pub mode: Mode,
    pub dirs_visited: usize,
    pub leaf_dirs: usize,
    /// Leaf directories holding at least one file that passed the extension filter.
    pub candidate_dirs: usize,
    pub subjects: usize,
    pub skipped_files: usize,
    pub incomplete_dirs: usize,
    pub unreadable_dirs: usize,
}

/// Ordered list of complete subjects found under a root directory.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    root: PathBuf,
    mode: Mode,
    filter: ExtensionFilter,
    subjects: Vec<SubjectRecord>,
    diagnostics: Vec<IndexDiagnostic>,
    dirs_visited: usize,
    leaf_dirs: usize,
    candidate_dirs: usize,
}

impl DatasetIndex {
    /// Walk `root` and collect every leaf directory whose channels match `mode`'s vocabulary.
    pub fn build(root: impl AsRef<Path>, mode: Mode, filter: ExtensionFilter) -> DatasetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = fs::metadata(&root).map_err(|e| BratsDatasetError::Io {
            path: root.clone(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(BratsDatasetError::Io {
                path: root,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut index = DatasetIndex {
            root: root.clone(),
            mode,
            filter,
            subjects: Vec::new(),
            diagnostics: Vec::new(),
            dirs_visited: 0,
            leaf_dirs: 0,
            candidate_dirs: 0,
        };
        index.walk(&root, true)?;
        debug!(
            root = %index.root.display(),
            mode = mode.as_str(),
            subjects = index.subjects.len(),
            diagnostics = index.diagnostics.len(),
            "indexed dataset"
        );
        Ok(index)
    }

    fn walk(&mut self, dir: &Path, is_root: bool) -> DatasetResult<()> {
        self.dirs_visited += 1;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if is_root => {
                return Err(BratsDatasetError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                self.unreadable(dir, e.to_string());
                return Ok(());
            }
        };

        let mut subdirs = Vec::new();
        let mut linked_dirs = 0usize;
        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.unreadable(dir, e.to_string());
                    continue;
                }
            };
            let path = entry.path();
            let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            if path.is_dir() {
                // Linked directories make the parent a non-leaf but are not followed.
                if is_symlink {
                    linked_dirs += 1;
                } else {
                    subdirs.push(path);
                }
                continue;
            }
            files.push(entry.file_name());
        }

        if subdirs.is_empty() && linked_dirs == 0 {
            self.leaf_dirs += 1;
            self.index_leaf(dir, files);
            return Ok(());
        }

        subdirs.sort();
        for sub in subdirs {
            self.walk(&sub, false)?;
        }
        Ok(())
    }

    /// Names that are not valid UTF-8 are matched by their lossy form but keep their real path.
    fn index_leaf(&mut self, dir: &Path, mut raw_files: Vec<OsString>) {
        raw_files.sort();
        let (names, raw_files): (Vec<String>, Vec<OsString>) = raw_files
            .into_iter()
            .map(|raw| (raw.to_string_lossy().into_owned(), raw))
            .filter(|(name, _)| self.filter.accepts(name))
            .unzip();
        if names.is_empty() {
            return;
        }
        self.candidate_dirs += 1;

        let mut channels = ChannelMap::default();
        for (file, raw) in names.iter().zip(&raw_files) {
            if raw.to_str().is_none() {
                debug!(dir = %dir.display(), file = %file, "file name is not valid UTF-8, matching its lossy form");
            }
            match parse_channel(file) {
                Some(token) => channels.insert(token, dir.join(raw)),
                None => {
                    warn!(dir = %dir.display(), file = %file, "cannot parse channel from file name, skipping");
                    self.diagnostics.push(IndexDiagnostic::UnparsableFilename {
                        dir: dir.to_path_buf(),
                        file: file.clone(),
                    });
                }
            }
        }

        if channels.is_empty() {
            return;
        }
        match channels.into_record(dir, self.mode) {
            Ok(record) => self.subjects.push(record),
            Err(found) => {
                let expected: Vec<String> = self
                    .mode
                    .vocabulary()
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect();
                warn!(
                    dir = %dir.display(),
                    expected = ?expected,
                    found = ?found,
                    files = ?names,
                    "incomplete subject directory, discarding"
                );
                self.diagnostics.push(IndexDiagnostic::IncompleteSubject {
                    dir: dir.to_path_buf(),
                    expected,
                    found,
                    files: names,
                });
            }
        }
    }

    fn unreadable(&mut self, dir: &Path, msg: String) {
        warn!(dir = %dir.display(), error = %msg, "cannot read directory, skipping");
        self.diagnostics.push(IndexDiagnostic::UnreadableDir {
            dir: dir.to_path_buf(),
            msg,
        });
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn filter(&self) -> ExtensionFilter {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subjects(&self) -> &[SubjectRecord] {
        &self.subjects
    }

    pub fn subject(&self, index: usize) -> DatasetResult<&SubjectRecord> {
        self.subjects.get(index).ok_or(BratsDatasetError::OutOfBounds {
            index,
            len: self.subjects.len(),
        })
    }

    pub fn diagnostics(&self) -> &[IndexDiagnostic] {
        &self.diagnostics
    }

    pub fn summary(&self) -> IndexSummary {
        let mut summary = IndexSummary {
            root: self.root.clone(),
            mode: self.mode,
            dirs_visited: self.dirs_visited,
            leaf_dirs: self.leaf_dirs,
            candidate_dirs: self.candidate_dirs,
            subjects: self.subjects.len(),
            ..Default::default()
        };
        for diag in &self.diagnostics {
            match diag {
                IndexDiagnostic::UnparsableFilename { .. } => summary.skipped_files += 1,
                IndexDiagnostic::IncompleteSubject { .. } => summary.incomplete_dirs += 1,
                IndexDiagnostic::UnreadableDir { .. } => summary.unreadable_dirs += 1,
            }
        }
        summary
    }
}

/// Channel files of one directory, keyed by parsed token.
#[derive(Debug, Default)]
struct ChannelMap {
    known: BTreeMap<Modality, PathBuf>,
    unknown: BTreeMap<String, PathBuf>,
}

impl ChannelMap {
    /// Later files overwrite earlier ones with the same token.
    fn insert(&mut self, token: &str, path: PathBuf) {
        match Modality::parse(token) {
            Some(m) => {
                if let Some(prev) = self.known.insert(m, path) {
                    debug!(channel = m.as_str(), replaced = %prev.display(), "duplicate channel file");
                }
            }
            None => {
                self.unknown.insert(token.to_string(), path);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }

    fn found(&self) -> Vec<String> {
        let mut found: Vec<String> = self
            .known
            .keys()
            .map(|m| m.as_str().to_string())
            .chain(self.unknown.keys().cloned())
            .collect();
        found.sort();
        found
    }

    /// Builds the record when the token set equals the vocabulary, else returns the found tokens.
    fn into_record(mut self, dir: &Path, mode: Mode) -> Result<SubjectRecord, Vec<String>> {
        let vocabulary = mode.vocabulary();
        let exact = self.unknown.is_empty()
            && self.known.len() == vocabulary.len()
            && vocabulary.iter().all(|m| self.known.contains_key(m));
        if !exact {
            return Err(self.found());
        }
        let mut take = |m: Modality| self.known.remove(&m).unwrap_or_default();
        let inputs = Modality::INPUTS.map(&mut take);
        let seg = match mode {
            Mode::Train => Some(take(Modality::Seg)),
            Mode::Test => None,
        };
        Ok(SubjectRecord::new(dir.to_path_buf(), inputs, seg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_token_is_third_segment_before_first_dot() {
        assert_eq!(parse_channel("BraTS2021_00002_seg.nii.gz"), Some("seg"));
        assert_eq!(parse_channel("BraTS2021_00002_t1ce.nii"), Some("t1ce"));
        assert_eq!(parse_channel("a_b_flair_extra.nii.gz"), Some("flair"));
        assert_eq!(parse_channel("scan.nii.gz"), None);
        assert_eq!(parse_channel("BraTS_00002.nii.gz"), None);
    }

    #[test]
    fn extension_filters() {
        assert!(ExtensionFilter::NiftiAny.accepts("x_1_t1.nii"));
        assert!(ExtensionFilter::NiftiAny.accepts("x_1_t1.nii.gz"));
        assert!(!ExtensionFilter::GzipOnly.accepts("x_1_t1.nii"));
        assert!(ExtensionFilter::GzipOnly.accepts("x_1_t1.nii.gz"));
        assert!(!ExtensionFilter::NiftiAny.accepts("notes.txt"));
    }

    #[test]
    fn channel_map_requires_exact_vocabulary() {
        let dir = Path::new("/data/s1");
        let mut map = ChannelMap::default();
        for m in Modality::INPUTS {
            map.insert(m.as_str(), dir.join(format!("x_1_{m}.nii.gz")));
        }
        map.insert("seg", dir.join("x_1_seg.nii.gz"));
        let found = map.into_record(dir, Mode::Test).unwrap_err();
        assert_eq!(found, vec!["flair", "seg", "t1", "t1ce", "t2"]);
    }

    #[test]
    fn channel_map_places_paths_by_modality() {
        let dir = Path::new("/data/s1");
        let mut map = ChannelMap::default();
        for token in ["seg", "flair", "t2", "t1ce", "t1"] {
            map.insert(token, dir.join(token));
        }
        let record = map.into_record(dir, Mode::Train).expect("complete");
        let order: Vec<_> = record.channels().map(|(m, _)| m).collect();
        assert_eq!(order, Mode::Train.vocabulary());
        assert_eq!(record.path(Modality::T1ce), Some(dir.join("t1ce").as_path()));
        assert_eq!(record.last_channel_path(), dir.join("seg"));
    }
}
