//! Volume augmentation with an explicit random generator.
//!
//! Transforms never touch ambient RNG state. The accessors hand the same
//! generator state to the image call and the label call, so random decisions
//! line up between the two.

use crate::types::DatasetResult;
use ndarray::{ArrayD, Axis};
use rand::{Rng, RngCore};
use std::fmt;
use std::sync::Arc;

pub trait VolumeTransform: Send + Sync {
    fn apply(&self, input: ArrayD<f32>, rng: &mut dyn RngCore) -> DatasetResult<ArrayD<f32>>;

    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> VolumeTransform for F
where
    F: Fn(ArrayD<f32>, &mut dyn RngCore) -> DatasetResult<ArrayD<f32>> + Send + Sync,
{
    fn apply(&self, input: ArrayD<f32>, rng: &mut dyn RngCore) -> DatasetResult<ArrayD<f32>> {
        self(input, rng)
    }
}

/// Spatial axis counted from the end of the tensor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAxis {
    /// Last axis.
    Width,
    /// Second to last.
    Height,
    /// Third to last.
    Depth,
}

impl SpatialAxis {
    fn offset(&self) -> usize {
        match self {
            SpatialAxis::Width => 1,
            SpatialAxis::Height => 2,
            SpatialAxis::Depth => 3,
        }
    }

    fn resolve(&self, ndim: usize) -> Option<Axis> {
        ndim.checked_sub(self.offset()).map(Axis)
    }
}

/// Reverses one spatial axis with probability `prob`.
///
/// One uniform draw is consumed per call even when the flip does not fire or
/// the axis does not exist, keeping generator consumption shape-independent.
#[derive(Debug, Clone, Copy)]
pub struct RandomFlip {
    pub axis: SpatialAxis,
    pub prob: f32,
}

impl RandomFlip {
    pub fn new(axis: SpatialAxis, prob: f32) -> Self {
        Self { axis, prob }
    }
}

impl VolumeTransform for RandomFlip {
    fn apply(&self, input: ArrayD<f32>, rng: &mut dyn RngCore) -> DatasetResult<ArrayD<f32>> {
        let draw: f32 = rng.random();
        if self.prob <= 0.0 || draw >= self.prob {
            return Ok(input);
        }
        let Some(axis) = self.axis.resolve(input.ndim()) else {
            return Ok(input);
        };
        let mut out = input;
        out.invert_axis(axis);
        Ok(out.as_standard_layout().into_owned())
    }

    fn describe(&self) -> String {
        format!("flip({:?}, p={:.2})", self.axis, self.prob)
    }
}

/// Ordered chain of transforms sharing one generator.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    steps: Vec<Arc<dyn VolumeTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TransformPipelineBuilder {
        TransformPipelineBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("steps", &self.describe())
            .finish()
    }
}

impl VolumeTransform for TransformPipeline {
    fn apply(&self, input: ArrayD<f32>, rng: &mut dyn RngCore) -> DatasetResult<ArrayD<f32>> {
        self.steps
            .iter()
            .try_fold(input, |acc, step| step.apply(acc, &mut *rng))
    }

    fn describe(&self) -> String {
        if self.steps.is_empty() {
            return "identity".to_string();
        }
        self.steps
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformPipelineBuilder {
    inner: TransformPipeline,
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flip_horizontal_prob(self, p: f32) -> Self {
        self.push(RandomFlip::new(SpatialAxis::Width, p))
    }

    pub fn flip_vertical_prob(self, p: f32) -> Self {
        self.push(RandomFlip::new(SpatialAxis::Height, p))
    }

    pub fn push(mut self, step: impl VolumeTransform + 'static) -> Self {
        self.inner.steps.push(Arc::new(step));
        self
    }

    pub fn build(self) -> TransformPipeline {
        self.inner
    }
}
