//! Indexing and sample assembly for multi-modal BraTS brain MRI datasets.
//!
//! This crate provides utilities for:
//! - Scanning a directory tree for complete subjects (t1, t1ce, t2, flair, seg)
//! - Structured diagnostics and threshold validation of the scan
//! - Whole-volume and per-slice sample access with cropping and label binarization
//! - Augmentation pipelines driven by an explicit random generator

pub mod assemble;
pub mod dataset;
pub mod index;
pub mod slices;
pub mod transform;
pub mod types;
pub mod validation;
pub mod volume;
pub mod volumes;

pub use assemble::{binarize, crop_last_two, stack_channels};
pub use dataset::{
    sample_rng, BratsDataset, DatasetOptions, SampleIter, DEFAULT_CROP_MARGIN, SLICES_PER_SUBJECT,
};
pub use index::{parse_channel, DatasetIndex, ExtensionFilter, IndexDiagnostic, IndexSummary};
pub use slices::{slice_identifier, BratsSlices};
pub use transform::{
    RandomFlip, SpatialAxis, TransformPipeline, TransformPipelineBuilder, VolumeTransform,
};
pub use types::*;
pub use validation::{
    validate_index, validate_summary, ValidationOutcome, ValidationReport, ValidationThresholds,
};
pub use volume::{NiftiReader, VolumeReader};
pub use volumes::BratsVolumes;
