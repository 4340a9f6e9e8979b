use crate::error::{MvpaError, Result};
use crate::linear::{fit_binary, sigmoid, BinaryUnit, Loss, SolverSettings};
use crate::param;
use log::warn;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Anything that can learn a decision rule from labelled rows.
///
/// Labels are encoded class indices in `0..n_classes`.
pub trait Classifier: Send + Sync {
    fn fit(&self, x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> Result<Box<dyn FittedModel>>;
    fn name(&self) -> &'static str;
}

/// A decision rule produced by [`Classifier::fit`]
pub trait FittedModel: Send + Sync {
    /// One row per sample, one column per class, rows summing to 1
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array2<f64>;

    /// Most probable class of each row, lowest index on ties
    fn predict(&self, x: ArrayView2<f64>) -> Vec<usize> {
        self.predict_proba(x)
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter().enumerate().fold((0, f64::NEG_INFINITY), |best, (c, &p)| {
                    if p > best.1 { (c, p) } else { best }
                }).0
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum ClassifierKind {
    logreg,
    svm,
}

/// Builds the classifier described by the configuration
pub fn build(param: &param::Classifier) -> Box<dyn Classifier> {
    let settings = SolverSettings {
        c: param.c,
        max_iterations: param.max_iterations,
        tolerance: param.tolerance,
    };
    match param.algo {
        ClassifierKind::logreg => Box::new(LogisticRegression { settings }),
        ClassifierKind::svm => Box::new(LinearSvm { settings }),
    }
}

/// L2-penalised logistic regression, one-vs-rest beyond two classes
pub struct LogisticRegression {
    pub settings: SolverSettings,
}

/// L2-penalised squared-hinge linear SVM, one-vs-rest beyond two classes.
///
/// Probabilities are the logistic transform of the decision value: they rank
/// rows like the decision function but are not calibrated.
pub struct LinearSvm {
    pub settings: SolverSettings,
}

impl Classifier for LogisticRegression {
    fn fit(&self, x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(LinearModel::fit(x, y, n_classes, Loss::Logistic, &self.settings)?))
    }

    fn name(&self) -> &'static str {
        "logistic regression"
    }
}

impl Classifier for LinearSvm {
    fn fit(&self, x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> Result<Box<dyn FittedModel>> {
        Ok(Box::new(LinearModel::fit(x, y, n_classes, Loss::SquaredHinge, &self.settings)?))
    }

    fn name(&self) -> &'static str {
        "linear SVM"
    }
}

/// Binary problems fitted for a set of classes.
///
/// With two classes `units` holds a single class-1-vs-class-0 function; otherwise
/// it holds one class-vs-rest function per class, `None` for classes absent from
/// the training rows.
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub n_classes: usize,
    pub units: Vec<Option<BinaryUnit>>,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<f64>, y: &[usize], n_classes: usize, loss: Loss, settings: &SolverSettings) -> Result<LinearModel> {
        let mut counts = vec![0usize; n_classes];
        for &c in y {
            counts[c] += 1;
        }
        let present = counts.iter().filter(|&&n| n > 0).count();
        if present < 2 {
            return Err(MvpaError::MissingClass { present, expected: n_classes });
        }
        if present < n_classes {
            warn!("Training rows miss {} of {} classes, these classes will never be predicted",
                n_classes - present, n_classes);
        }

        let units = if n_classes == 2 {
            let positive: Vec<bool> = y.iter().map(|&c| c == 1).collect();
            vec![Some(fit_binary(x, &positive, loss, settings)?)]
        } else {
            (0..n_classes)
                .map(|class| {
                    if counts[class] == 0 {
                        return Ok(None);
                    }
                    let positive: Vec<bool> = y.iter().map(|&c| c == class).collect();
                    fit_binary(x, &positive, loss, settings).map(Some)
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(LinearModel { n_classes, units })
    }

    /// Raw decision values, one column per unit
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::from_elem((x.nrows(), self.units.len()), f64::NEG_INFINITY);
        for (k, unit) in self.units.iter().enumerate() {
            if let Some(unit) = unit {
                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    out[[i, k]] = unit.decision(row);
                }
            }
        }
        out
    }
}

impl FittedModel for LinearModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let decision = self.decision_function(x);
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));

        if self.n_classes == 2 {
            for (i, d) in decision.column(0).iter().enumerate() {
                let p1 = sigmoid(*d);
                proba[[i, 0]] = 1.0 - p1;
                proba[[i, 1]] = p1;
            }
            return proba;
        }

        for (i, row) in decision.axis_iter(Axis(0)).enumerate() {
            // absent classes have a -inf decision, hence a null score
            let scores: Vec<f64> = row.iter().map(|&d| sigmoid(d)).collect();
            let total: f64 = scores.iter().sum();
            for (c, s) in scores.iter().enumerate() {
                proba[[i, c]] = if total > 0.0 { s / total } else { 1.0 / self.n_classes as f64 };
            }
        }
        proba
    }
}
