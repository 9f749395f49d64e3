//! Quality gate over an index summary.

use crate::index::{DatasetIndex, IndexSummary};
use crate::types::{DatasetResult, BratsDatasetError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub max_incomplete: Option<usize>,
    pub max_skipped_files: Option<usize>,
    pub max_incomplete_ratio: Option<f32>,
    pub min_subjects: Option<usize>,
}

impl ValidationThresholds {
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok()?.parse().ok()
        }
        ValidationThresholds {
            max_incomplete: parse("BRATS_DATASET_MAX_INCOMPLETE"),
            max_skipped_files: parse("BRATS_DATASET_MAX_SKIPPED"),
            max_incomplete_ratio: parse("BRATS_DATASET_MAX_INCOMPLETE_RATIO"),
            min_subjects: parse("BRATS_DATASET_MIN_SUBJECTS"),
        }
    }

    /// Fields set in `other` win.
    pub fn merged_with(&self, other: &ValidationThresholds) -> Self {
        ValidationThresholds {
            max_incomplete: other.max_incomplete.or(self.max_incomplete),
            max_skipped_files: other.max_skipped_files.or(self.max_skipped_files),
            max_incomplete_ratio: other.max_incomplete_ratio.or(self.max_incomplete_ratio),
            min_subjects: other.min_subjects.or(self.min_subjects),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub reasons: Vec<String>,
    pub summary: IndexSummary,
}

impl ValidationReport {
    pub fn to_json_pretty(&self) -> DatasetResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BratsDatasetError::Other(e.to_string()))
    }
}

fn apply_thresholds(
    label: &str,
    count: usize,
    ratio: f32,
    max_count: Option<usize>,
    max_ratio: Option<f32>,
    outcome: &mut ValidationOutcome,
    reasons: &mut Vec<String>,
) {
    if let Some(max) = max_count {
        if count > max {
            *outcome = ValidationOutcome::Fail;
            reasons.push(format!("{label}: {count} exceeds max {max}"));
        }
    }
    if let Some(max_r) = max_ratio {
        if ratio > max_r {
            *outcome = ValidationOutcome::Fail;
            reasons.push(format!("{label}: ratio {ratio:.3} exceeds max {max_r:.3}"));
        }
    }
    if count > 0 {
        if *outcome == ValidationOutcome::Pass {
            *outcome = ValidationOutcome::Warn;
        }
        reasons.push(format!("{label}: {count} observed"));
    }
}

pub fn validate_summary(summary: IndexSummary, thresholds: &ValidationThresholds) -> ValidationReport {
    let denom = summary.candidate_dirs.max(1) as f32;
    let mut outcome = ValidationOutcome::Pass;
    let mut reasons = Vec::new();

    apply_thresholds(
        "incomplete subject dirs",
        summary.incomplete_dirs,
        summary.incomplete_dirs as f32 / denom,
        thresholds.max_incomplete,
        thresholds.max_incomplete_ratio,
        &mut outcome,
        &mut reasons,
    );
    apply_thresholds(
        "unparsable file names",
        summary.skipped_files,
        0.0,
        thresholds.max_skipped_files,
        None,
        &mut outcome,
        &mut reasons,
    );
    apply_thresholds(
        "unreadable dirs",
        summary.unreadable_dirs,
        0.0,
        None,
        None,
        &mut outcome,
        &mut reasons,
    );
    if let Some(min) = thresholds.min_subjects {
        if summary.subjects < min {
            outcome = ValidationOutcome::Fail;
            reasons.push(format!("subjects: {} below min {min}", summary.subjects));
        }
    }

    ValidationReport {
        outcome,
        reasons,
        summary,
    }
}

pub fn validate_index(index: &DatasetIndex, thresholds: &ValidationThresholds) -> ValidationReport {
    validate_summary(index.summary(), thresholds)
}
