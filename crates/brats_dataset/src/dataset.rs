//! Accessor interface and options shared by the volume and slice datasets.

use crate::index::DatasetIndex;
use crate::transform::VolumeTransform;
use crate::types::{BratsSample, DatasetResult, Mode};
use crate::volume::{NiftiReader, VolumeReader};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;

/// Voxels trimmed from each side of the last two axes by the volume accessor.
pub const DEFAULT_CROP_MARGIN: usize = 8;
/// Axial depth of a BraTS volume; the slice accessor exposes this many samples per subject.
pub const SLICES_PER_SUBJECT: usize = 155;

/// Indexed collection of image/label samples.
///
/// `get` derives a fresh generator per call; `get_with_rng` lets a worker
/// that owns its generator drive the transforms directly.
pub trait BratsDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(&self) -> &DatasetIndex;

    fn seed(&self) -> Option<u64>;

    fn get_with_rng(&self, index: usize, rng: &mut StdRng) -> DatasetResult<BratsSample>;

    fn get(&self, index: usize) -> DatasetResult<BratsSample> {
        let mut rng = sample_rng(self.seed(), index);
        self.get_with_rng(index, &mut rng)
    }

    fn iter(&self) -> SampleIter<'_, Self>
    where
        Self: Sized,
    {
        SampleIter {
            dataset: self,
            next: 0,
        }
    }
}

/// Seeded datasets mix the sample index into the seed so each index replays identically.
pub fn sample_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ index as u64),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

pub struct SampleIter<'a, D> {
    dataset: &'a D,
    next: usize,
}

impl<D: BratsDataset> Iterator for SampleIter<'_, D> {
    type Item = DatasetResult<BratsSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.dataset.len().saturating_sub(self.next);
        (rest, Some(rest))
    }
}

/// Construction options for [`crate::BratsVolumes`] and [`crate::BratsSlices`].
#[derive(Clone)]
pub struct DatasetOptions {
    pub mode: Mode,
    /// Applied to the image and, with replayed generator state, to the label.
    pub transform: Option<Arc<dyn VolumeTransform>>,
    pub reader: Arc<dyn VolumeReader>,
    /// Only used by the volume accessor.
    pub crop_margin: usize,
    /// Only used by the slice accessor.
    pub slices_per_subject: usize,
    pub seed: Option<u64>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Train,
            transform: None,
            reader: Arc::new(NiftiReader),
            crop_margin: DEFAULT_CROP_MARGIN,
            slices_per_subject: SLICES_PER_SUBJECT,
            seed: None,
        }
    }
}

impl DatasetOptions {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn transform(mut self, transform: impl VolumeTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn reader(mut self, reader: impl VolumeReader + 'static) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn crop_margin(mut self, margin: usize) -> Self {
        self.crop_margin = margin;
        self
    }

    pub fn slices_per_subject(mut self, slices: usize) -> Self {
        self.slices_per_subject = slices;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

impl fmt::Debug for DatasetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetOptions")
            .field("mode", &self.mode)
            .field(
                "transform",
                &self.transform.as_ref().map(|t| t.describe()),
            )
            .field("crop_margin", &self.crop_margin)
            .field("slices_per_subject", &self.slices_per_subject)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
