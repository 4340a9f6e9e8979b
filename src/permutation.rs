use rayon::prelude::*;
use crate::classifier::Classifier;
use crate::cv::{mean_score, CV};
use crate::error::{MvpaError, Result};
use crate::scoring::Scoring;
use crate::utils::{derive_seeds, mean_and_std};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Observed cross-validated score and its label-shuffled null distribution
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PermutationResult {
    pub observed_score: f64,
    pub fold_scores: Vec<f64>,
    /// One aggregate score per permutation, in permutation order
    pub null_scores: Vec<f64>,
    pub p_value: f64,
    pub null_mean: f64,
    pub null_std: f64,
}

impl PermutationResult {
    pub fn from_scores(fold_scores: Vec<f64>, null_scores: Vec<f64>) -> PermutationResult {
        let observed_score = mean_score(&fold_scores);
        let p_value = p_value(observed_score, &null_scores);
        let (null_mean, null_std) = mean_and_std(&null_scores);
        PermutationResult { observed_score, fold_scores, null_scores, p_value, null_mean, null_std }
    }
}

/// Empirical p-value `(#{null >= observed} + 1) / (P + 1)`, never 0
pub fn p_value(observed: f64, null_scores: &[f64]) -> f64 {
    let at_least = null_scores.iter().filter(|&&s| s >= observed).count();
    (at_least as f64 + 1.0) / (null_scores.len() as f64 + 1.0)
}

/// Observed pass followed by `n_permutations` shuffled passes on already prepared folds.
pub fn permutation_test(cv: &CV, classifier: &dyn Classifier, scoring: Scoring, n_permutations: usize,
    seed: u64, thread_number: usize, running: Arc<AtomicBool>) -> Result<PermutationResult> {
    let prepared = cv.prepared_folds()?;
    let fold_scores = prepared.iter()
        .map(|fold| fold.evaluate(classifier, scoring, &fold.y_train)
            .map(|(_, score)| score)
            .map_err(|e| e.in_fold(fold.index, fold.group, None)))
        .collect::<Result<Vec<f64>>>()?;

    let null_scores = null_distribution(cv, classifier, scoring, n_permutations, seed, thread_number, running)?;
    Ok(PermutationResult::from_scores(fold_scores, null_scores))
}

/// Aggregate CV score under `n_permutations` independent shufflings of the training labels.
///
/// Permutation `p` shuffles a private copy of each fold's training labels with a
/// generator seeded from the `p`-th draw of the master generator, so the output
/// does not depend on `thread_number`. Held-out rows are always scored against
/// their true labels. Any failure, or `running` being cleared, aborts the whole
/// distribution.
pub fn null_distribution(cv: &CV, classifier: &dyn Classifier, scoring: Scoring, n_permutations: usize,
    seed: u64, thread_number: usize, running: Arc<AtomicBool>) -> Result<Vec<f64>> {
    if n_permutations == 0 {
        return Err(MvpaError::InvalidPermutationCount);
    }
    let prepared = cv.prepared_folds()?;
    if let Some(fold) = prepared.first() {
        scoring.check(fold.n_classes)?;
    }

    let mut main_rng = ChaCha8Rng::seed_from_u64(seed);
    let seeds = derive_seeds(&mut main_rng, n_permutations);

    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_number)
        .build()
        .map_err(|e| MvpaError::InvalidParam(format!("cannot build thread pool: {}", e)))?;

    let done = AtomicUsize::new(0);
    let milestone = (n_permutations / 10).max(1);

    let null_scores = thread_pool.install(|| {
        seeds
            .par_iter()
            .enumerate()
            .map(|(p, &permutation_seed)| {
                if !running.load(Ordering::Relaxed) {
                    return Err(MvpaError::Interrupted);
                }
                let mut rng = ChaCha8Rng::seed_from_u64(permutation_seed);

                let scores = prepared.iter()
                    .map(|fold| {
                        let mut y_shuffled = fold.y_train.clone();
                        y_shuffled.shuffle(&mut rng);
                        fold.evaluate(classifier, scoring, &y_shuffled)
                            .map(|(_, score)| score)
                            .map_err(|e| e.in_fold(fold.index, fold.group, Some(p)))
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let score = mean_score(&scores);
                debug!("Permutation #{} | {} {:.3}", p + 1, scoring, score);

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % milestone == 0 {
                    info!("{}/{} permutations completed", n, n_permutations);
                }
                Ok(score)
            })
            .collect::<Result<Vec<f64>>>()
    })?;

    Ok(null_scores)
}
