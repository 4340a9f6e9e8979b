#![allow(non_snake_case)]

pub mod classifier;
pub mod cv;
pub mod data;
pub mod error;
pub mod experiment;
pub mod linear;
pub mod param;
pub mod pca;
pub mod permutation;
pub mod preparation;
pub mod scoring;
pub mod utils;

use crate::classifier::build;
use crate::cv::CV;
use crate::data::Data;
use crate::error::MvpaError;
use crate::experiment::Experiment;
use crate::param::Param;
use crate::permutation::{null_distribution, PermutationResult};
use chrono::Local;
use log::{debug, warn};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Crate version with the git hash captured at build time, when available
pub fn version() -> String {
    match option_env!("MVPA_GIT_SHA") {
        Some(sha) => format!("{}#{}", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Loads the three TSV files named in `param.data` and runs the analysis on them
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment, MvpaError> {
    if param.data.X.is_empty() || param.data.y.is_empty() || param.data.groups.is_empty() {
        return Err(MvpaError::InvalidParam("data.X, data.y and data.groups must all be set".to_string()));
    }
    let data = Data::load_data(&param.data.X, &param.data.y, &param.data.groups, param.data.features_in_rows)?;
    run_on_data(&data, param, running)
}

/// Leave-one-group-out decoding of `data` followed by the label permutation test.
///
/// Every configuration problem is reported before any model is fitted.
pub fn run_on_data(data: &Data, param: &Param, running: Arc<AtomicBool>) -> Result<Experiment, MvpaError> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let colorful = param.general.display_colorful;

    if data.X.nrows() != data.y.len() || data.X.nrows() != data.groups.len() {
        return Err(MvpaError::DimensionMismatch { rows: data.X.nrows(), labels: data.y.len(), groups: data.groups.len() });
    }
    cinfo!(colorful, "\x1b[2;97m{:?}\x1b[0m", data);

    if data.n_classes() < 2 {
        return Err(MvpaError::TooFewClasses(data.n_classes()));
    }
    param.cv.scoring.check(data.n_classes())?;
    if param.permutation.n_permutations == 0 {
        return Err(MvpaError::InvalidPermutationCount);
    }
    if param.general.thread_number == 0 {
        return Err(MvpaError::InvalidParam("thread_number must be at least 1".to_string()));
    }

    let mut cv = CV::leave_one_group_out(&data.groups)?;
    if let Some(k) = param.preparation.n_components {
        let allowed = cv.min_train_len().min(data.feature_len);
        if k == 0 || k > allowed {
            return Err(MvpaError::RankExceeded {
                requested: k,
                allowed,
                context: format!("{} features, smallest training fold of {} rows", data.feature_len, cv.min_train_len()),
            });
        }
    }

    let unbalanced = data.check_group_balance();
    if unbalanced > 0 {
        warn!("{} of {} groups miss at least one class", unbalanced, cv.len());
    }

    let classifier = build(&param.classifier);
    cinfo!(colorful, "\x1b[1;93mDecoding {} classes with {} | {} folds | {} permutations\x1b[0m",
        data.n_classes(), classifier.name(), cv.len(), param.permutation.n_permutations);

    cv.prepare(data, param.preparation.n_components, param.general.thread_number)?;
    let folds = cv.pass(classifier.as_ref(), param.cv.scoring, &data.classes)?;
    let fold_scores: Vec<f64> = folds.iter().map(|f| f.score).collect();
    cinfo!(colorful, "\x1b[1;93mObserved {}: {:.3}\x1b[0m", param.cv.scoring, cv::mean_score(&fold_scores));

    let null_scores = null_distribution(&cv, classifier.as_ref(), param.cv.scoring, param.permutation.n_permutations,
        param.general.seed, param.general.thread_number, running)?;
    let result = PermutationResult::from_scores(fold_scores, null_scores);
    cinfo!(colorful, "\x1b[1;93mPermutation test completed | null {:.3} ± {:.3} | p = {:.4}\x1b[0m",
        result.null_mean, result.null_std, result.p_value);

    let exec_time = start.elapsed().as_secs_f64();
    debug!("Analysis completed in {:.2}s", exec_time);

    let output_name = param.general.save_exp.split('.').next().filter(|s| !s.is_empty()).unwrap_or("mvpa");

    Ok(Experiment {
        id: format!("{}_{:?}_{}", output_name, param.classifier.algo, timestamp),
        timestamp,
        mvpa_version: version(),
        parameters: param.clone(),
        data_fingerprint: data.fingerprint(),
        n_samples: data.sample_len,
        n_features: data.feature_len,
        classes: data.classes.clone(),
        groups: cv.folds.iter().map(|f| f.group).collect(),
        classifier: classifier.name().to_string(),
        cv_folds_ids: cv.get_ids(data),
        folds,
        result,
        execution_time: exec_time,
    })
}
