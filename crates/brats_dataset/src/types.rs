//! Core types, error definitions, and data structures for brats_dataset.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DatasetResult<T> = Result<T, BratsDatasetError>;

#[derive(Debug, Error)]
pub enum BratsDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("nifti decode error at {path}: {source}")]
    Nifti {
        path: PathBuf,
        #[source]
        source: nifti::error::NiftiError,
    },
    #[error("shape error at {path}: {msg}")]
    Shape { path: PathBuf, msg: String },
    #[error("index {index} out of bounds for dataset of length {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("config error at {path}: {msg}")]
    Config { path: PathBuf, msg: String },
    #[error("{0}")]
    Other(String),
}

/// One MRI sequence (or the segmentation) of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    T1,
    T1ce,
    T2,
    Flair,
    Seg,
}

impl Modality {
    /// Input sequences in stacking order.
    pub const INPUTS: [Modality; 4] = [Modality::T1, Modality::T1ce, Modality::T2, Modality::Flair];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::T1 => "t1",
            Modality::T1ce => "t1ce",
            Modality::T2 => "t2",
            Modality::Flair => "flair",
            Modality::Seg => "seg",
        }
    }

    /// Exact, case-sensitive match on the channel token of a file name.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "t1" => Some(Modality::T1),
            "t1ce" => Some(Modality::T1ce),
            "t2" => Some(Modality::T2),
            "flair" => Some(Modality::Flair),
            "seg" => Some(Modality::Seg),
            _ => None,
        }
    }

    fn input_slot(&self) -> Option<usize> {
        Modality::INPUTS.iter().position(|m| m == self)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Train mode expects a segmentation next to the inputs; test mode does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Train,
    Test,
}

impl Mode {
    pub fn from_test_flag(test: bool) -> Self {
        if test {
            Mode::Test
        } else {
            Mode::Train
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Mode::Test)
    }

    /// Required channels in stacking order; `seg` is always last when present.
    pub fn vocabulary(&self) -> &'static [Modality] {
        static TRAIN: [Modality; 5] = [
            Modality::T1,
            Modality::T1ce,
            Modality::T2,
            Modality::Flair,
            Modality::Seg,
        ];
        match self {
            Mode::Train => &TRAIN,
            Mode::Test => &TRAIN[..4],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Test => "test",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = BratsDatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            other => Err(BratsDatasetError::Other(format!(
                "unknown mode '{other}' (expected train or test)"
            ))),
        }
    }
}

/// A validated subject: every channel of the active vocabulary has exactly one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    dir: PathBuf,
    inputs: [PathBuf; 4],
    seg: Option<PathBuf>,
}

impl SubjectRecord {
    pub(crate) fn new(dir: PathBuf, inputs: [PathBuf; 4], seg: Option<PathBuf>) -> Self {
        Self { dir, inputs, seg }
    }

    /// Directory the channel files were found in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> Mode {
        if self.seg.is_some() {
            Mode::Train
        } else {
            Mode::Test
        }
    }

    pub fn path(&self, modality: Modality) -> Option<&Path> {
        match modality.input_slot() {
            Some(slot) => Some(self.inputs[slot].as_path()),
            None => self.seg.as_deref(),
        }
    }

    /// Channel files in vocabulary order.
    pub fn channels(&self) -> impl Iterator<Item = (Modality, &Path)> + '_ {
        Modality::INPUTS
            .iter()
            .zip(self.inputs.iter())
            .map(|(m, p)| (*m, p.as_path()))
            .chain(self.seg.as_deref().map(|p| (Modality::Seg, p)))
    }

    /// Path of the channel loaded last; used as the sample identifier.
    pub fn last_channel_path(&self) -> &Path {
        self.seg.as_deref().unwrap_or(self.inputs[3].as_path())
    }
}

/// Image/label pair returned by the accessors.
///
/// In test mode `label` holds a copy of `image`; `id` is the last channel's
/// path (whole volumes) or a virtual per-slice path.
#[derive(Debug, Clone)]
pub struct BratsSample {
    pub image: ArrayD<f32>,
    pub label: ArrayD<f32>,
    pub id: PathBuf,
}
