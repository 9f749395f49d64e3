use std::path::{Path, PathBuf};

use brats_dataset::{
    DatasetOptions, Mode, TransformPipeline, ValidationThresholds, DEFAULT_CROP_MARGIN,
    SLICES_PER_SUBJECT,
};
use serde::Deserialize;
use tracing::warn;

const DEFAULT_CONFIG_NAME: &str = "brats-tools.toml";
const CONFIG_ENV: &str = "BRATS_TOOLS_CONFIG";

/// Which accessor a tool drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One cropped whole volume per subject.
    #[default]
    Volume,
    /// One uncropped axial slice per sample.
    Slice,
}

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub root: PathBuf,
    pub mode: Mode,
    pub variant: Variant,
    pub seed: Option<u64>,
    pub crop_margin: usize,
    pub slices_per_subject: usize,
    pub flip_horizontal_prob: f32,
    pub flip_vertical_prob: f32,
    pub thresholds: ValidationThresholds,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/brats"),
            mode: Mode::Train,
            variant: Variant::Volume,
            seed: None,
            crop_margin: DEFAULT_CROP_MARGIN,
            slices_per_subject: SLICES_PER_SUBJECT,
            flip_horizontal_prob: 0.0,
            flip_vertical_prob: 0.0,
            thresholds: ValidationThresholds::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToolConfigFile {
    root: Option<String>,
    mode: Option<Mode>,
    variant: Option<Variant>,
    seed: Option<u64>,
    crop: Option<CropSection>,
    slices: Option<SliceSection>,
    augment: Option<AugmentSection>,
    validation: Option<ValidationThresholds>,
}

#[derive(Debug, Deserialize, Default)]
struct CropSection {
    margin: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SliceSection {
    per_subject: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct AugmentSection {
    flip_horizontal_prob: Option<f32>,
    flip_vertical_prob: Option<f32>,
}

impl ToolConfig {
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let cfg = Self::from_path(Path::new(&path)).unwrap_or_default();
            cfg.warn_if_invalid();
            return cfg;
        }
        let cfg = Self::from_path(Path::new(DEFAULT_CONFIG_NAME)).unwrap_or_default();
        cfg.warn_if_invalid();
        cfg
    }

    /// Explicitly named config file; checked like [`ToolConfig::load`] but without the default fallback.
    pub fn load_from(path: &Path) -> Option<Self> {
        let cfg = Self::from_path(path)?;
        cfg.warn_if_invalid();
        Some(cfg)
    }

    /// `None` when the file is missing or does not parse.
    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = std::fs::read_to_string(path).ok()?;
        match Self::parse(&raw) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable tools config");
                None
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        let file: ToolConfigFile = toml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ToolConfigFile) -> Self {
        let defaults = ToolConfig::default();
        let augment = file.augment.unwrap_or_default();
        ToolConfig {
            root: file
                .root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.root),
            mode: file.mode.unwrap_or(defaults.mode),
            variant: file.variant.unwrap_or(defaults.variant),
            seed: file.seed,
            crop_margin: file
                .crop
                .and_then(|c| c.margin)
                .unwrap_or(defaults.crop_margin),
            slices_per_subject: file
                .slices
                .and_then(|s| s.per_subject)
                .unwrap_or(defaults.slices_per_subject),
            flip_horizontal_prob: augment
                .flip_horizontal_prob
                .unwrap_or(defaults.flip_horizontal_prob),
            flip_vertical_prob: augment
                .flip_vertical_prob
                .unwrap_or(defaults.flip_vertical_prob),
            thresholds: file.validation.unwrap_or_default(),
        }
    }

    pub fn warn_if_invalid(&self) -> Vec<String> {
        let problems = self.problems();
        for problem in &problems {
            warn!("tools config: {problem}");
        }
        problems
    }

    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            out.push(format!(
                "root {} is not a directory; indexing will fail",
                self.root.display()
            ));
        }
        if self.slices_per_subject == 0 {
            out.push("slices.per_subject is 0; the slice variant cannot be opened".to_string());
        }
        if self.crop_margin > 0 && self.crop_margin.checked_mul(2).is_none() {
            out.push(format!("crop.margin = {} cannot fit any volume", self.crop_margin));
        }
        for (name, p) in [
            ("flip_horizontal_prob", self.flip_horizontal_prob),
            ("flip_vertical_prob", self.flip_vertical_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                out.push(format!("augment.{name} = {p} is outside [0, 1]"));
            }
        }
        out
    }

    /// Empty pipeline when no augmentation is configured.
    pub fn transform_pipeline(&self) -> Option<TransformPipeline> {
        let mut builder = TransformPipeline::builder();
        if self.flip_horizontal_prob > 0.0 {
            builder = builder.flip_horizontal_prob(self.flip_horizontal_prob);
        }
        if self.flip_vertical_prob > 0.0 {
            builder = builder.flip_vertical_prob(self.flip_vertical_prob);
        }
        let pipeline = builder.build();
        (!pipeline.is_empty()).then_some(pipeline)
    }

    pub fn dataset_options(&self) -> DatasetOptions {
        let mut options = DatasetOptions::new(self.mode)
            .crop_margin(self.crop_margin)
            .slices_per_subject(self.slices_per_subject)
            .seed(self.seed);
        if let Some(pipeline) = self.transform_pipeline() {
            options = options.transform(pipeline);
        }
        options
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&format!("${{{key}}}")),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
