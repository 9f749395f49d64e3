//! Whole-volume samples, one per subject.

use crate::assemble::{stack_channels, Assembler};
use crate::dataset::{BratsDataset, DatasetOptions};
use crate::index::{DatasetIndex, ExtensionFilter};
use crate::types::{BratsDatasetError, BratsSample, DatasetResult};
use rand::rngs::StdRng;
use std::path::Path;
use tracing::debug;

/// Samples are `[C, X, Y, Z]` images cropped on the last two axes.
///
/// Train mode yields four input channels and a binarized `[1, X, Y, Z]` label;
/// test mode yields all four channels twice.
#[derive(Debug, Clone)]
pub struct BratsVolumes {
    index: DatasetIndex,
    options: DatasetOptions,
}

impl BratsVolumes {
    /// Index `root` accepting `.nii` and `.nii.gz` files.
    pub fn open(root: impl AsRef<Path>, options: DatasetOptions) -> DatasetResult<Self> {
        let index = DatasetIndex::build(root, options.mode, ExtensionFilter::NiftiAny)?;
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
        Ok(Self { index, options })
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }
}

impl BratsDataset for BratsVolumes {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn index(&self) -> &DatasetIndex {
        &self.index
    }

    fn seed(&self) -> Option<u64> {
        self.options.seed
    }

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> DatasetResult<BratsSample> {
        let subject = self.index.subject(index)?;
        let mut channels = Vec::with_capacity(5);
        for (modality, path) in subject.channels() {
            debug!(channel = modality.as_str(), path = %path.display(), "loading volume");
            channels.push(self.options.reader.read(path)?);
        }
        let id = subject.last_channel_path().to_path_buf();
        let stack = stack_channels(&channels, &id)?;
        drop(channels);

        Assembler {
            mode: self.options.mode,
            crop_margin: self.options.crop_margin,
            transform: self.options.transform.as_deref(),
        }
        .assemble(stack, rng, id)
    }
}
