use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use brats_dataset::{
    validate_index, BratsDataset, BratsSlices, BratsVolumes, IndexDiagnostic, Mode,
    ValidationOutcome, ValidationThresholds,
};
use brats_tools::{ToolConfig, Variant};
use clap::Parser;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "brats_index",
    about = "Index a BraTS directory tree, report skipped entries and check sample shapes"
)]
struct Args {
    /// Tools config file (defaults to $BRATS_TOOLS_CONFIG or ./brats-tools.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dataset root; overrides the config file.
    #[arg(long)]
    root: Option<PathBuf>,
    /// train expects a seg channel per subject, test does not.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,
    #[arg(long, value_enum)]
    variant: Option<Variant>,
    /// Seed for per-sample augmentation.
    #[arg(long)]
    seed: Option<u64>,
    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Print every indexed subject directory.
    #[arg(long, default_value_t = false)]
    list: bool,
    /// Load this sample index and report its shapes.
    #[arg(long)]
    probe: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    index: usize,
    id: PathBuf,
    image_shape: Vec<usize>,
    label_shape: Vec<usize>,
    label_foreground: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    variant: &'static str,
    samples: usize,
    validation: &'a brats_dataset::ValidationReport,
    diagnostics: &'a [IndexDiagnostic],
    subjects: Vec<PathBuf>,
    probe: Option<ProbeReport>,
}

fn parse_mode(raw: &str) -> std::result::Result<Mode, String> {
    raw.parse::<Mode>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            ToolConfig::load_from(path)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => ToolConfig::load(),
    };
    if let Some(root) = args.root {
        cfg.root = root;
    }
    if let Some(mode) = args.mode {
        cfg.mode = mode;
    }
    if let Some(variant) = args.variant {
        cfg.variant = variant;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }

    let options = cfg.dataset_options();
    info!(root = %cfg.root.display(), mode = cfg.mode.as_str(), variant = ?cfg.variant, ?options, "opening dataset");
    let dataset: Box<dyn BratsDataset> = match cfg.variant {
        Variant::Volume => Box::new(
            BratsVolumes::open(&cfg.root, options)
                .with_context(|| format!("index {}", cfg.root.display()))?,
        ),
        Variant::Slice => Box::new(
            BratsSlices::open(&cfg.root, options)
                .with_context(|| format!("index {}", cfg.root.display()))?,
        ),
    };

    let thresholds = cfg.thresholds.merged_with(&ValidationThresholds::from_env());
    let index = dataset.index();
    let report = validate_index(index, &thresholds);

    let probe = match args.probe {
        Some(i) => {
            let sample = dataset
                .get(i)
                .with_context(|| format!("load sample {i}"))?;
            Some(ProbeReport {
                index: i,
                id: sample.id,
                image_shape: sample.image.shape().to_vec(),
                label_shape: sample.label.shape().to_vec(),
                label_foreground: sample.label.iter().filter(|v| **v > 0.0).count(),
            })
        }
        None => None,
    };

    let variant = match cfg.variant {
        Variant::Volume => "volume",
        Variant::Slice => "slice",
    };
    if args.json {
        let out = JsonReport {
            variant,
            samples: dataset.len(),
            validation: &report,
            diagnostics: index.diagnostics(),
            subjects: if args.list {
                index.subjects().iter().map(|s| s.dir().to_path_buf()).collect()
            } else {
                Vec::new()
            },
            probe,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let s = &report.summary;
        println!("root: {}", s.root.display());
        println!("mode: {}  variant: {variant}", s.mode.as_str());
        println!(
            "dirs visited: {}  leaf dirs: {}  with volumes: {}",
            s.dirs_visited, s.leaf_dirs, s.candidate_dirs
        );
        println!(
            "subjects: {}  samples: {}  incomplete dirs: {}  skipped files: {}  unreadable dirs: {}",
            s.subjects,
            dataset.len(),
            s.incomplete_dirs,
            s.skipped_files,
            s.unreadable_dirs
        );
        if args.list {
            for subject in index.subjects() {
                println!("  {}", subject.dir().display());
            }
        }
        println!("validation: {}", report.outcome.as_str());
        for reason in &report.reasons {
            println!("  - {reason}");
        }
        if let Some(p) = &probe {
            println!(
                "probe {}: image {:?} label {:?} foreground voxels {} id {}",
                p.index,
                p.image_shape,
                p.label_shape,
                p.label_foreground,
                p.id.display()
            );
        }
    }

    if report.outcome == ValidationOutcome::Fail {
        bail!("dataset validation failed: {}", report.reasons.join("; "));
    }
    Ok(())
}
