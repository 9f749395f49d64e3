//! Volumetric file reading.

use crate::types::{BratsDatasetError, DatasetResult};
use ndarray::{ArrayD, Axis};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;

/// Decodes one channel file into an array with at least three spatial axes.
pub trait VolumeReader: Send + Sync {
    fn read(&self, path: &Path) -> DatasetResult<ArrayD<f32>>;
}

impl<F> VolumeReader for F
where
    F: Fn(&Path) -> DatasetResult<ArrayD<f32>> + Send + Sync,
{
    fn read(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        self(path)
    }
}

/// NIfTI-1 reader for `.nii` and `.nii.gz` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiReader;

impl VolumeReader for NiftiReader {
    fn read(&self, path: &Path) -> DatasetResult<ArrayD<f32>> {
        let nifti_err = |source: nifti::error::NiftiError| BratsDatasetError::Nifti {
            path: path.to_path_buf(),
            source,
        };
        let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
        let volume = obj.into_volume().into_ndarray::<f32>().map_err(nifti_err)?;
        squeeze_to_spatial(volume, path)
    }
}

/// Drops trailing singleton axes past the third; rejects arrays with fewer than three axes.
pub(crate) fn squeeze_to_spatial(mut volume: ArrayD<f32>, path: &Path) -> DatasetResult<ArrayD<f32>> {
    while volume.ndim() > 3 && volume.shape()[volume.ndim() - 1] == 1 {
        let last = volume.ndim() - 1;
        volume = volume.index_axis_move(Axis(last), 0);
    }
    if volume.ndim() < 3 {
        return Err(BratsDatasetError::Shape {
            path: path.to_path_buf(),
            msg: format!("expected at least 3 spatial axes, got shape {:?}", volume.shape()),
        });
    }
    Ok(volume)
}
