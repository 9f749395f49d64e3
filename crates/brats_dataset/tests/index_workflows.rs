//! Integration tests for directory indexing.

use brats_dataset::{DatasetIndex, ExtensionFilter, IndexDiagnostic, Mode, Modality};
use std::fs;
use std::path::Path;

fn touch(dir: &Path, names: &[&str]) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    for name in names {
        fs::write(dir.join(name), b"")?;
    }
    Ok(())
}

fn subject_files(id: &str, channels: &[&str]) -> Vec<String> {
    channels
        .iter()
        .map(|c| format!("BraTS2021_{id}_{c}.nii.gz"))
        .collect()
}

fn touch_subject(root: &Path, id: &str, channels: &[&str]) -> anyhow::Result<()> {
    let files = subject_files(id, channels);
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    touch(&root.join(format!("BraTS2021_{id}")), &names)
}

const TRAIN: [&str; 5] = ["t1", "t1ce", "t2", "flair", "seg"];

#[test]
fn complete_subject_maps_every_channel() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    // Creation order differs from vocabulary order on purpose.
    touch_subject(tmp.path(), "00002", &["seg", "t2", "flair", "t1ce", "t1"])?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert_eq!(index.len(), 1);
    assert!(index.diagnostics().is_empty());

    let subject = index.subject(0)?;
    let dir = tmp.path().join("BraTS2021_00002");
    assert_eq!(subject.dir(), dir);
    for m in Mode::Train.vocabulary() {
        let expected = dir.join(format!("BraTS2021_00002_{}.nii.gz", m.as_str()));
        assert_eq!(subject.path(*m), Some(expected.as_path()));
    }
    let order: Vec<Modality> = subject.channels().map(|(m, _)| m).collect();
    assert_eq!(order, Mode::Train.vocabulary());
    Ok(())
}

#[test]
fn subject_missing_flair_is_excluded_with_diagnostic() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    touch_subject(tmp.path(), "00001", &TRAIN)?;
    touch_subject(tmp.path(), "00002", &["t1", "t1ce", "t2", "seg"])?;
    touch_subject(tmp.path(), "00003", &TRAIN)?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert_eq!(index.len(), 2);
    assert!(index
        .subjects()
        .iter()
        .all(|s| !s.dir().ends_with("BraTS2021_00002")));

    assert_eq!(index.diagnostics().len(), 1);
    match &index.diagnostics()[0] {
        IndexDiagnostic::IncompleteSubject {
            dir,
            expected,
            found,
            files,
        } => {
            assert!(dir.ends_with("BraTS2021_00002"));
            assert_eq!(expected, &vec!["t1", "t1ce", "t2", "flair", "seg"]);
            assert_eq!(found, &vec!["seg", "t1", "t1ce", "t2"]);
            assert_eq!(files.len(), 4);
        }
        other => panic!("unexpected diagnostic {other:?}"),
    }

    let summary = index.summary();
    assert_eq!(summary.subjects, 2);
    assert_eq!(summary.incomplete_dirs, 1);
    assert_eq!(summary.candidate_dirs, 3);
    Ok(())
}

#[test]
fn short_file_names_are_skipped_not_fatal() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("BraTS2021_00004");
    let mut files = subject_files("00004", &TRAIN);
    files.push("scan.nii.gz".to_string());
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    touch(&dir, &names)?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert_eq!(index.len(), 1);
    assert_eq!(
        index.diagnostics(),
        &[IndexDiagnostic::UnparsableFilename {
            dir: dir.clone(),
            file: "scan.nii.gz".to_string(),
        }]
    );
    assert_eq!(index.summary().skipped_files, 1);
    Ok(())
}

#[test]
fn directory_of_only_unparsable_files_is_silently_dropped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    touch(&tmp.path().join("odd"), &["scan.nii.gz"])?;
    touch(&tmp.path().join("notes"), &["README.txt"])?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert!(index.is_empty());
    assert_eq!(index.diagnostics().len(), 1);
    assert!(matches!(
        index.diagnostics()[0],
        IndexDiagnostic::UnparsableFilename { .. }
    ));
    let summary = index.summary();
    assert_eq!(summary.leaf_dirs, 2);
    assert_eq!(summary.candidate_dirs, 1);
    assert_eq!(summary.incomplete_dirs, 0);
    Ok(())
}

#[test]
fn only_leaf_directories_are_subjects() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let parent = tmp.path().join("HGG");
    // Files next to a subdirectory are never indexed.
    let stray = subject_files("00009", &TRAIN);
    let stray: Vec<&str> = stray.iter().map(String::as_str).collect();
    touch(&parent, &stray)?;
    touch_subject(&parent, "00010", &TRAIN)?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert_eq!(index.len(), 1);
    assert!(index.subject(0)?.dir().ends_with("BraTS2021_00010"));
    Ok(())
}

#[test]
fn subjects_are_ordered_by_directory_name() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    for id in ["00030", "00010", "00020"] {
        touch_subject(&tmp.path().join("nested"), id, &TRAIN)?;
    }
    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    let dirs: Vec<String> = index
        .subjects()
        .iter()
        .map(|s| s.dir().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(dirs, ["BraTS2021_00010", "BraTS2021_00020", "BraTS2021_00030"]);
    Ok(())
}

#[test]
fn extension_filter_decides_plain_nii() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let names: Vec<String> = TRAIN
        .iter()
        .map(|c| format!("BraTS2021_00005_{c}.nii"))
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    touch(&tmp.path().join("s5"), &names)?;

    let any = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert_eq!(any.len(), 1);
    let gz = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::GzipOnly)?;
    assert!(gz.is_empty());
    assert!(gz.diagnostics().is_empty());
    Ok(())
}

#[test]
fn test_mode_rejects_directories_carrying_a_segmentation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    touch_subject(tmp.path(), "00001", &["t1", "t1ce", "t2", "flair"])?;
    touch_subject(tmp.path(), "00002", &TRAIN)?;

    let index = DatasetIndex::build(tmp.path(), Mode::Test, ExtensionFilter::NiftiAny)?;
    assert_eq!(index.len(), 1);
    let subject = index.subject(0)?;
    assert_eq!(subject.mode(), Mode::Test);
    assert_eq!(subject.path(Modality::Seg), None);
    assert_eq!(subject.channels().count(), 4);
    assert!(subject
        .last_channel_path()
        .to_string_lossy()
        .ends_with("_flair.nii.gz"));
    Ok(())
}

#[test]
fn unknown_channel_tokens_break_completeness() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    touch_subject(tmp.path(), "00001", &["t1", "t1ce", "t2", "flair", "seg", "mask"])?;
    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert!(index.is_empty());
    match &index.diagnostics()[0] {
        IndexDiagnostic::IncompleteSubject { found, .. } => assert!(found.contains(&"mask".to_string())),
        other => panic!("unexpected diagnostic {other:?}"),
    }
    Ok(())
}

#[test]
fn every_record_matches_the_vocabulary() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    touch_subject(tmp.path(), "00001", &TRAIN)?;
    touch_subject(tmp.path(), "00002", &["t1", "t2"])?;
    touch_subject(tmp.path(), "00003", &["t1", "t1ce", "t2", "flair"])?;
    touch_subject(tmp.path(), "00004", &TRAIN)?;

    for mode in [Mode::Train, Mode::Test] {
        let index = DatasetIndex::build(tmp.path(), mode, ExtensionFilter::NiftiAny)?;
        for subject in index.subjects() {
            let channels: Vec<Modality> = subject.channels().map(|(m, _)| m).collect();
            assert_eq!(channels, mode.vocabulary());
        }
    }
    Ok(())
}

#[test]
fn empty_root_is_valid_and_missing_root_is_an_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert!(index.is_empty());
    assert!(index.subject(0).is_err());

    let missing = DatasetIndex::build(tmp.path().join("nope"), Mode::Train, ExtensionFilter::NiftiAny);
    assert!(missing.is_err());
    Ok(())
}

#[test]
fn diagnostics_serialize_with_kind_tags() -> anyhow::Result<()> {
    let diag = IndexDiagnostic::UnparsableFilename {
        dir: "/data/s1".into(),
        file: "scan.nii.gz".into(),
    };
    let json = serde_json::to_value(&diag)?;
    assert_eq!(json["kind"], "unparsable_filename");
    assert_eq!(json["file"], "scan.nii.gz");
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_names_are_matched_and_keep_their_real_path() -> anyhow::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("s1");
    touch(&dir, &["BraTS_00001_t1ce.nii.gz", "BraTS_00001_t2.nii.gz"])?;
    touch(&dir, &["BraTS_00001_flair.nii.gz", "BraTS_00001_seg.nii.gz"])?;
    let raw_t1 = OsStr::from_bytes(b"BraTS\xff_00001_t1.nii.gz");
    fs::write(dir.join(raw_t1), b"")?;

    let index = DatasetIndex::build(tmp.path(), Mode::Train, ExtensionFilter::NiftiAny)?;
    assert!(index.diagnostics().is_empty(), "{:?}", index.diagnostics());
    assert_eq!(index.len(), 1);
    let t1 = index.subject(0)?.path(Modality::T1).expect("t1 path");
    assert_eq!(t1, dir.join(raw_t1));
    assert!(t1.exists());
    Ok(())
}
