//! End-to-end test from TSV files to a persisted experiment
//!
//! 1. Writes X / y / groups tables the way an fMRI export would
//! 2. Runs `run` from a parameter file
//! 3. Checks the experiment against `run_on_data` on the same table
//! 4. Saves and reloads the experiment in every supported format
//!
//! Run with: cargo test --test test_tsv_e2e -- --nocapture
use mvpa::data::Data;
use mvpa::experiment::Experiment;
use mvpa::param::{self, Param};
use mvpa::{run, run_on_data};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const N_RUNS: usize = 3;
const TRIALS_PER_RUN: usize = 8;
const VOXELS: usize = 5;

/// Deterministic trials: voxels 0 and 1 carry the condition, the others drift with the trial index
fn voxel_value(trial: usize, voxel: usize) -> f64 {
    let condition = if trial % 2 == 0 { 1.0 } else { -1.0 };
    let wobble = ((trial * 7 + voxel * 3) % 11) as f64 / 11.0 - 0.5;
    match voxel {
        0 => 1.5 * condition + wobble,
        1 => -condition + 0.5 * wobble,
        _ => wobble + 0.1 * voxel as f64,
    }
}

fn write_dataset(dir: &Path, features_in_rows: bool) {
    fs::create_dir_all(dir).unwrap();
    let n = N_RUNS * TRIALS_PER_RUN;
    let trial_name = |t: usize| format!("trial{:02}", t);
    let voxel_name = |v: usize| format!("vox{}", v);

    let mut x = String::new();
    if features_in_rows {
        x.push_str("voxel");
        for t in 0..n {
            x.push_str(&format!("\t{}", trial_name(t)));
        }
        x.push('\n');
        for v in 0..VOXELS {
            x.push_str(&voxel_name(v));
            for t in 0..n {
                x.push_str(&format!("\t{}", voxel_value(t, v)));
            }
            x.push('\n');
        }
    } else {
        x.push_str("trial");
        for v in 0..VOXELS {
            x.push_str(&format!("\t{}", voxel_name(v)));
        }
        x.push('\n');
        for t in 0..n {
            x.push_str(&trial_name(t));
            for v in 0..VOXELS {
                x.push_str(&format!("\t{}", voxel_value(t, v)));
            }
            x.push('\n');
        }
    }
    fs::write(dir.join("X.tsv"), x).unwrap();

    // label and run files list the trials in reverse order
    let mut y = String::from("trial\tcondition\n");
    let mut groups = String::from("trial\trun\n");
    for t in (0..n).rev() {
        y.push_str(&format!("{}\t{}\n", trial_name(t), if t % 2 == 0 { 1 } else { 2 }));
        groups.push_str(&format!("{}\t{}\n", trial_name(t), t / TRIALS_PER_RUN + 1));
    }
    fs::write(dir.join("y.tsv"), y).unwrap();
    fs::write(dir.join("groups.tsv"), groups).unwrap();
}

fn dataset_param(dir: &Path, features_in_rows: bool) -> Param {
    let mut param = Param::default();
    param.data.X = dir.join("X.tsv").to_string_lossy().to_string();
    param.data.y = dir.join("y.tsv").to_string_lossy().to_string();
    param.data.groups = dir.join("groups.tsv").to_string_lossy().to_string();
    param.data.features_in_rows = features_in_rows;
    param.general.display_colorful = false;
    param.general.thread_number = 2;
    param.permutation.n_permutations = 39;
    param
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn running() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

#[test]
fn test_run_from_parameter_file() {
    let dir = scratch_dir("mvpa_tsv_e2e_param_file");
    write_dataset(&dir, false);

    let yaml = format!(
        "general:\n  seed: 11\n  thread_number: 2\n  display_colorful: false\n\
         data:\n  X: {}\n  y: {}\n  groups: {}\n\
         classifier:\n  algo: logreg\n  c: 0.5\n\
         cv:\n  scoring: auc\n\
         permutation:\n  n_permutations: 39\n",
        dir.join("X.tsv").display(), dir.join("y.tsv").display(), dir.join("groups.tsv").display()
    );
    let param_path = dir.join("param.yaml");
    fs::write(&param_path, yaml).unwrap();

    let param = param::get(param_path.to_string_lossy().to_string()).unwrap();
    let exp = run(&param, running()).unwrap();

    assert_eq!(exp.n_samples, N_RUNS * TRIALS_PER_RUN);
    assert_eq!(exp.n_features, VOXELS);
    assert_eq!(exp.classes, vec![1, 2]);
    assert_eq!(exp.groups, vec![1, 2, 3]);
    assert_eq!(exp.result.null_scores.len(), 39);
    assert!(exp.result.observed_score > 0.9, "AUROC {}", exp.result.observed_score);
    assert!(exp.result.observed_score > exp.result.null_mean);
    assert!(exp.result.p_value >= 1.0 / 40.0 && exp.result.p_value < 0.5, "p = {}", exp.result.p_value);

    // held-out names of the first fold are exactly the trials of run 1
    let expected: Vec<String> = (0..TRIALS_PER_RUN).map(|t| format!("trial{:02}", t)).collect();
    assert_eq!(exp.cv_folds_ids[0].1, expected);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_run_matches_run_on_data() {
    let dir = scratch_dir("mvpa_tsv_e2e_consistency");
    write_dataset(&dir, true);
    let param = dataset_param(&dir, true);

    let from_files = run(&param, running()).unwrap();
    let data = Data::load_data(&param.data.X, &param.data.y, &param.data.groups, true).unwrap();
    let in_memory = run_on_data(&data, &param, running()).unwrap();

    assert_eq!(from_files.data_fingerprint, data.fingerprint());
    assert_eq!(from_files.data_fingerprint, in_memory.data_fingerprint);
    assert_eq!(from_files.result, in_memory.result);
    assert_eq!(from_files.folds, in_memory.folds);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_layouts_give_the_same_experiment() {
    let dir_rows = scratch_dir("mvpa_tsv_e2e_features_in_rows");
    let dir_cols = scratch_dir("mvpa_tsv_e2e_features_in_columns");
    write_dataset(&dir_rows, true);
    write_dataset(&dir_cols, false);

    let a = run(&dataset_param(&dir_rows, true), running()).unwrap();
    let b = run(&dataset_param(&dir_cols, false), running()).unwrap();
    assert_eq!(a.data_fingerprint, b.data_fingerprint);
    assert_eq!(a.result, b.result);

    fs::remove_dir_all(&dir_rows).unwrap();
    fs::remove_dir_all(&dir_cols).unwrap();
}

#[test]
fn test_experiment_persistence_formats() {
    let dir = scratch_dir("mvpa_tsv_e2e_persistence");
    write_dataset(&dir, false);
    let exp = run(&dataset_param(&dir, false), running()).unwrap();

    for name in ["exp.bin", "exp.yaml", "exp.json"] {
        let path = dir.join(name);
        exp.save_auto(&path).unwrap();
        let loaded = Experiment::load_auto(&path).unwrap();
        assert_eq!(loaded.id, exp.id);
        assert_eq!(loaded.parameters, exp.parameters);
        assert_eq!(loaded.folds, exp.folds);
        assert_eq!(loaded.result.null_scores.len(), exp.result.null_scores.len());
        assert!((loaded.result.p_value - exp.result.p_value).abs() < 1e-12, "{}", name);
        assert!((loaded.result.observed_score - exp.result.observed_score).abs() < 1e-12, "{}", name);
    }

    let bin = Experiment::load_auto(dir.join("exp.bin")).unwrap();
    assert_eq!(bin, exp, "bincode must round-trip exactly");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_files_are_reported() {
    let dir = scratch_dir("mvpa_tsv_e2e_missing");
    let param = dataset_param(&dir, false);
    assert!(run(&param, running()).is_err());
}
