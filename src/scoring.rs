use crate::classifier::FittedModel;
use crate::error::{MvpaError, Result};
use crate::utils::average_ranks;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-fold performance metric
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum Scoring {
    accuracy,
    auc,
}

impl Scoring {
    /// Checks the metric can be computed for the number of classes of the table
    pub fn check(&self, n_classes: usize) -> Result<()> {
        match self {
            Scoring::accuracy => Ok(()),
            Scoring::auc if n_classes == 2 => Ok(()),
            Scoring::auc => Err(MvpaError::UnsupportedScoring { metric: self.to_string(), classes: n_classes }),
        }
    }

    /// Scores a fitted model on held-out rows against their true encoded labels
    pub fn score(&self, model: &dyn FittedModel, x: ArrayView2<f64>, y_true: &[usize]) -> Result<f64> {
        match self {
            Scoring::accuracy => Ok(accuracy(y_true, &model.predict(x))),
            Scoring::auc => {
                let proba = model.predict_proba(x);
                let positives: Vec<bool> = y_true.iter().map(|&c| c == 1).collect();
                roc_auc(&proba.column(1).to_vec(), &positives)
            }
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoring::accuracy => write!(f, "accuracy"),
            Scoring::auc => write!(f, "AUROC"),
        }
    }
}

/// Fraction of exact matches
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

/// Area under the ROC curve from the Mann-Whitney U statistic.
///
/// Tied scores get average ranks, so a tie between a positive and a negative
/// counts as half a correct ordering.
pub fn roc_auc(scores: &[f64], positives: &[bool]) -> Result<f64> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(MvpaError::UnscorableFold(format!(
            "AUROC needs both classes, got {} positive and {} negative rows", n_pos, n_neg
        )));
    }

    let ranks = average_ranks(scores);
    let rank_sum_pos: f64 = ranks.iter().zip(positives.iter())
        .filter(|(_, &p)| p)
        .map(|(&r, _)| r)
        .sum();

    let n_pos = n_pos as f64;
    let u_stat = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u_stat / (n_pos * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, ArrayView2};

    struct FixedModel {
        proba: Array2<f64>,
    }

    impl FittedModel for FixedModel {
        fn predict_proba(&self, _x: ArrayView2<f64>) -> Array2<f64> {
            self.proba.clone()
        }
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[2, 2], &[2, 2]), 1.0);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels).unwrap(), 1.0);
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels).unwrap(), 0.0);
    }

    #[test]
    fn test_roc_auc_known_value_with_ties() {
        // pairs (pos, neg): (0.5 vs 0.5) tie, (0.5 vs 0.1) win, (0.4 vs 0.5) loss, (0.4 vs 0.1) win
        let auc = roc_auc(&[0.5, 0.4, 0.5, 0.1], &[true, true, false, false]).unwrap();
        assert!((auc - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_constant_scores_is_chance() {
        let auc = roc_auc(&[0.3; 6], &[true, false, true, false, true, false]).unwrap();
        assert_eq!(auc, 0.5);
    }

    #[test]
    fn test_roc_auc_single_class_is_unscorable() {
        let err = roc_auc(&[0.1, 0.2], &[true, true]).unwrap_err();
        assert!(matches!(err, MvpaError::UnscorableFold(_)));
    }

    #[test]
    fn test_check_auc_requires_two_classes() {
        assert!(Scoring::auc.check(2).is_ok());
        assert!(matches!(Scoring::auc.check(3), Err(MvpaError::UnsupportedScoring { classes: 3, .. })));
        assert!(Scoring::accuracy.check(5).is_ok());
    }

    #[test]
    fn test_score_uses_model_output() {
        let model = FixedModel { proba: array![[0.9, 0.1], [0.3, 0.7], [0.6, 0.4]] };
        let x = Array2::<f64>::zeros((3, 1));
        let y_true = [0, 1, 1];
        let acc = Scoring::accuracy.score(&model, x.view(), &y_true).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);
        let auc = Scoring::auc.score(&model, x.view(), &y_true).unwrap();
        assert_eq!(auc, 1.0);
    }
}
