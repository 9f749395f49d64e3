//! Turning loaded channel volumes into an image/label sample.

use crate::transform::VolumeTransform;
use crate::types::{BratsDatasetError, BratsSample, DatasetResult, Mode};
use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};

/// Stacks equally shaped channels along a new leading axis.
pub fn stack_channels(channels: &[ArrayD<f32>], id: &Path) -> DatasetResult<ArrayD<f32>> {
    let views: Vec<ArrayViewD<'_, f32>> = channels.iter().map(|c| c.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| BratsDatasetError::Shape {
        path: id.to_path_buf(),
        msg: format!(
            "cannot stack channels with shapes {:?}: {e}",
            channels.iter().map(|c| c.shape().to_vec()).collect::<Vec<_>>()
        ),
    })
}

/// Keeps `[margin, dim - margin)` on each of the last two axes.
pub fn crop_last_two(mut x: ArrayD<f32>, margin: usize, id: &Path) -> DatasetResult<ArrayD<f32>> {
    if margin == 0 {
        return Ok(x);
    }
    let ndim = x.ndim();
    if ndim < 2 {
        return Err(BratsDatasetError::Shape {
            path: id.to_path_buf(),
            msg: format!("cannot crop shape {:?}", x.shape()),
        });
    }
    for ax in [ndim - 2, ndim - 1] {
        let dim = x.shape()[ax];
        if margin.checked_mul(2).map_or(true, |twice| dim <= twice) {
            return Err(BratsDatasetError::Shape {
                path: id.to_path_buf(),
                msg: format!("axis {ax} of size {dim} is too small for a {margin}-voxel crop"),
            });
        }
        x.slice_axis_inplace(Axis(ax), Slice::from(margin..dim - margin));
    }
    Ok(x.as_standard_layout().into_owned())
}

/// 1.0 where the value is positive, 0.0 elsewhere; merges all tumor classes.
pub fn binarize(x: &ArrayD<f32>) -> ArrayD<f32> {
    x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Shared split/crop/binarize/transform step of both accessors.
pub(crate) struct Assembler<'a> {
    pub mode: Mode,
    pub crop_margin: usize,
    pub transform: Option<&'a dyn VolumeTransform>,
}

impl Assembler<'_> {
    /// `stack` is `[C, ...]` with the vocabulary's channels in order.
    pub fn assemble(&self, stack: ArrayD<f32>, rng: &mut StdRng, id: PathBuf) -> DatasetResult<BratsSample> {
        match self.mode {
            Mode::Test => {
                let mut image = crop_last_two(stack, self.crop_margin, &id)?;
                if let Some(t) = self.transform {
                    image = t.apply(image, rng)?;
                }
                Ok(BratsSample {
                    label: image.clone(),
                    image,
                    id,
                })
            }
            Mode::Train => {
                let channels = stack.shape()[0];
                if channels < 2 {
                    return Err(BratsDatasetError::Shape {
                        path: id,
                        msg: format!("train sample needs image and label channels, got {channels}"),
                    });
                }
                let image = stack
                    .slice_axis(Axis(0), Slice::from(0..channels - 1))
                    .to_owned();
                let label = stack.index_axis(Axis(0), channels - 1).insert_axis(Axis(0)).to_owned();
                let image = crop_last_two(image, self.crop_margin, &id)?;
                let label = binarize(&crop_last_two(label, self.crop_margin, &id)?);

                let (image, label) = match self.transform {
                    Some(t) => {
                        let snapshot = rng.clone();
                        let image = t.apply(image, rng)?;
                        *rng = snapshot;
                        let label = t.apply(label, rng)?;
                        (image, label)
                    }
                    None => (image, label),
                };
                Ok(BratsSample { image, label, id })
            }
        }
    }
}
