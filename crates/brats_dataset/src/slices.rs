//! Axial slice samples, a fixed number per subject.

use crate::assemble::{stack_channels, Assembler};
use crate::dataset::{BratsDataset, DatasetOptions};
use crate::index::{DatasetIndex, ExtensionFilter};
use crate::types::{BratsDatasetError, BratsSample, DatasetResult};
use ndarray::Axis;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Samples are `[C, H, W]` planes taken at `volume[:, :, slice]`, uncropped.
#[derive(Debug, Clone)]
pub struct BratsSlices {
    index: DatasetIndex,
    options: DatasetOptions,
}

impl BratsSlices {
    /// Index `root` accepting `.nii.gz` files only.
    pub fn open(root: impl AsRef<Path>, options: DatasetOptions) -> DatasetResult<Self> {
        let index = DatasetIndex::build(root, options.mode, ExtensionFilter::GzipOnly)?;
        Self::from_index(index, options)
    }

    pub fn from_index(index: DatasetIndex, options: DatasetOptions) -> DatasetResult<Self> {
        if index.mode() != options.mode {
            return Err(BratsDatasetError::Other(format!(
                "index built for {} mode, options request {} mode",
                index.mode().as_str(),
                options.mode.as_str()
            )));
        }
        if options.slices_per_subject == 0 {
            return Err(BratsDatasetError::Other(
                "slices_per_subject must be positive".to_string(),
            ));
        }
        if index.len().checked_mul(options.slices_per_subject).is_none() {
            return Err(BratsDatasetError::Other(format!(
                "{} subjects x {} slices per subject overflows the sample count",
                index.len(),
                options.slices_per_subject
            )));
        }
        Ok(Self { index, options })
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn slices_per_subject(&self) -> usize {
        self.options.slices_per_subject
    }

    /// Flat sample index to `(subject, slice)`.
    pub fn locate(&self, flat: usize) -> (usize, usize) {
        let per = self.options.slices_per_subject;
        (flat / per, flat % per)
    }
}

/// `<path up to the first ".nii">_slice<N>.nii`; names no real file.
pub fn slice_identifier(path: &Path, slice: usize) -> PathBuf {
    let raw = path.to_string_lossy();
    let stem = match raw.find(".nii") {
        Some(pos) => &raw[..pos],
        None => &raw[..],
    };
    PathBuf::from(format!("{stem}_slice{slice}.nii"))
}

impl BratsDataset for BratsSlices {
    fn len(&self) -> usize {
        self.index.len() * self.options.slices_per_subject
    }

    fn index(&self) -> &DatasetIndex {
        &self.index
    }

    fn seed(&self) -> Option<u64> {
        self.options.seed
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> DatasetResult<BratsSample> {
        let (subject_idx, slice) = self.locate(index);
        let subject = self.index.subject(subject_idx).map_err(|_| BratsDatasetError::OutOfBounds {
            index,
            len: self.len(),
        })?;

        let mut planes = Vec::with_capacity(5);
        for (modality, path) in subject.channels() {
            debug!(channel = modality.as_str(), slice, path = %path.display(), "loading slice");
            let volume = self.options.reader.read(path)?;
            let depth = volume.shape().get(2).copied().unwrap_or(0);
            if slice >= depth {
                return Err(BratsDatasetError::Shape {
                    path: path.to_path_buf(),
                    msg: format!("slice {slice} beyond depth {depth} of shape {:?}", volume.shape()),
                });
            }
            planes.push(volume.index_axis(Axis(2), slice).to_owned());
        }
        let id = slice_identifier(subject.last_channel_path(), slice);
        let stack = stack_channels(&planes, &id)?;

        Assembler {
            mode: self.options.mode,
            crop_margin: 0,
            transform: self.options.transform.as_deref(),
        }
        .assemble(stack, rng, id)
    }
}
