use rayon::prelude::*;
use crate::classifier::{Classifier, FittedModel};
use crate::data::Data;
use crate::error::{MvpaError, Result};
use crate::preparation::FeaturePreparation;
use crate::scoring::Scoring;
use crate::utils::{distinct_sorted, mean_and_std};
use log::{debug, info};
use ndarray::{Array2, Axis};
use serde::{Serialize, Deserialize};

/// One held-out group: every row of `group` is tested, every other row trains.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Fold {
    pub group: i64,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// A fold with its preparation fitted and both row sets already transformed.
///
/// The preparation does not depend on labels, so the same prepared fold serves
/// the observed pass and every permutation.
#[derive(Clone, Debug)]
pub struct PreparedFold {
    pub index: usize,
    pub group: i64,
    pub preparation: FeaturePreparation,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Vec<usize>,
    pub y_test: Vec<usize>,
    pub n_classes: usize,
}

impl PreparedFold {
    /// Fits `classifier` on the training rows with the given labels and scores
    /// it against the true labels of the held-out rows.
    pub fn evaluate(&self, classifier: &dyn Classifier, scoring: Scoring, y_train: &[usize]) -> Result<(Box<dyn FittedModel>, f64)> {
        let model = classifier.fit(self.x_train.view(), y_train, self.n_classes)?;
        let score = scoring.score(model.as_ref(), self.x_test.view(), &self.y_test)?;
        Ok((model, score))
    }
}

/// Outcome of one fold of the observed (unpermuted) pass
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FoldResult {
    pub group: i64,
    pub n_train: usize,
    pub n_test: usize,
    pub score: f64,
    /// Raw labels predicted for the held-out rows, in row order
    pub predictions: Vec<i64>,
}

/// Leave-one-group-out split of a table, folds ordered by ascending group id.
#[derive(Clone, Debug)]
pub struct CV {
    pub folds: Vec<Fold>,
    pub prepared: Option<Vec<PreparedFold>>,
}

impl CV {
    /// One fold per distinct value of `groups`
    pub fn leave_one_group_out(groups: &[i64]) -> Result<CV> {
        CV::for_groups(groups, &distinct_sorted(groups))
    }

    /// One fold per requested group id; every row must belong to one of them.
    pub fn for_groups(groups: &[i64], ids: &[i64]) -> Result<CV> {
        let ids = distinct_sorted(ids);
        if ids.len() < 2 {
            return Err(MvpaError::TooFewGroups(ids.len()));
        }
        if let Some(orphan) = groups.iter().find(|&&g| ids.binary_search(&g).is_err()) {
            return Err(MvpaError::InvalidParam(format!("group {} is not among the requested groups {:?}", orphan, ids)));
        }

        let mut folds = Vec::with_capacity(ids.len());
        for &group in &ids {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..groups.len()).partition(|&i| groups[i] == group);
            if test.is_empty() {
                return Err(MvpaError::EmptyGroup(group));
            }
            folds.push(Fold { group, train, test });
        }

        Ok(CV { folds, prepared: None })
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// Fits the feature preparation of every fold on its training rows only and
    /// caches the transformed matrices.
    pub fn prepare(&mut self, data: &Data, n_components: Option<usize>, thread_number: usize) -> Result<()> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_number)
            .build()
            .map_err(|e| MvpaError::InvalidParam(format!("cannot build thread pool: {}", e)))?;

        let n_classes = data.n_classes();
        let prepared = thread_pool.install(|| {
            self.folds
                .par_iter()
                .enumerate()
                .map(|(index, fold)| {
                    let train = data.X.select(Axis(0), &fold.train);
                    let test = data.X.select(Axis(0), &fold.test);
                    let preparation = FeaturePreparation::fit(train.view(), n_components)
                        .map_err(|e| e.in_fold(index, fold.group, None))?;
                    debug!("Fold #{} (group {}): {} training rows, {} held-out rows, {} prepared features",
                        index + 1, fold.group, fold.train.len(), fold.test.len(), preparation.n_outputs());

                    Ok(PreparedFold {
                        index,
                        group: fold.group,
                        x_train: preparation.transform(train.view()),
                        x_test: preparation.transform(test.view()),
                        preparation,
                        y_train: fold.train.iter().map(|&i| data.y[i]).collect(),
                        y_test: fold.test.iter().map(|&i| data.y[i]).collect(),
                        n_classes,
                    })
                })
                .collect::<Result<Vec<PreparedFold>>>()
        })?;

        self.prepared = Some(prepared);
        Ok(())
    }

    pub fn prepared_folds(&self) -> Result<&[PreparedFold]> {
        self.prepared
            .as_deref()
            .ok_or_else(|| MvpaError::InvalidParam("folds are not prepared, run prepare() first".to_string()))
    }

    /// Size of the smallest training set over all folds
    pub fn min_train_len(&self) -> usize {
        self.folds.iter().map(|f| f.train.len()).min().unwrap_or(0)
    }

    /// Observed pass: true labels on every fold
    pub fn pass(&self, classifier: &dyn Classifier, scoring: Scoring, classes: &[i64]) -> Result<Vec<FoldResult>> {
        let prepared = self.prepared_folds()?;
        scoring.check(classes.len())?;
        let mut results = Vec::with_capacity(prepared.len());

        for fold in prepared {
            let (model, score) = fold.evaluate(classifier, scoring, &fold.y_train)
                .map_err(|e| e.in_fold(fold.index, fold.group, None))?;
            let predictions = model.predict(fold.x_test.view())
                .into_iter()
                .map(|c| classes[c])
                .collect();

            info!("Fold #{} completed | held-out group {} | {} {:.3}", fold.index + 1, fold.group, scoring, score);

            results.push(FoldResult {
                group: fold.group,
                n_train: fold.y_train.len(),
                n_test: fold.y_test.len(),
                score,
                predictions,
            });
        }

        Ok(results)
    }

    /// Training and held-out sample names of every fold
    pub fn get_ids(&self, data: &Data) -> Vec<(Vec<String>, Vec<String>)> {
        self.folds.iter()
            .map(|fold| {
                let names = |rows: &[usize]| rows.iter().map(|&i| data.samples[i].clone()).collect::<Vec<String>>();
                (names(&fold.train), names(&fold.test))
            })
            .collect()
    }
}

/// Arithmetic mean of the fold scores
pub fn mean_score(scores: &[f64]) -> f64 {
    mean_and_std(scores).0
}
