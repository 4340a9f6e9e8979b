use thiserror::Error;

/// Errors raised while preparing, cross-validating or permuting a decoding analysis.
///
/// Configuration variants are raised before any model is fitted. Anything that
/// goes wrong inside a fold is wrapped in [`MvpaError::Fold`] so the caller knows
/// which held-out run (and which permutation, if any) triggered it.
#[derive(Error, Debug)]
pub enum MvpaError {
    #[error("at least 2 distinct groups are required to hold one out, found {0}")]
    TooFewGroups(usize),

    #[error("group {0} contains no observation")]
    EmptyGroup(i64),

    #[error("permutation count must be strictly positive")]
    InvalidPermutationCount,

    #[error("dimension mismatch: {rows} feature rows, {labels} labels, {groups} group ids")]
    DimensionMismatch { rows: usize, labels: usize, groups: usize },

    #[error("requested {requested} components but at most {allowed} are allowed ({context})")]
    RankExceeded { requested: usize, allowed: usize, context: String },

    #[error("at least 2 classes are required, found {0}")]
    TooFewClasses(usize),

    #[error("{metric} scoring requires exactly 2 classes, found {classes}")]
    UnsupportedScoring { metric: String, classes: usize },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("all {0} features have zero variance in the training rows")]
    AllFeaturesDegenerate(usize),

    #[error("training rows contain {present} class(es) out of {expected}, cannot fit a classifier")]
    MissingClass { present: usize, expected: usize },

    #[error("held-out rows cannot be scored: {0}")]
    UnscorableFold(String),

    #[error("classifier did not converge: {0}")]
    Convergence(String),

    #[error("fold {fold} (group {group}{}) failed: {source}", permutation_suffix(.permutation))]
    Fold {
        fold: usize,
        group: i64,
        permutation: Option<usize>,
        #[source]
        source: Box<MvpaError>,
    },

    #[error("sample {0} has no matching entry")]
    MissingSample(String),

    #[error("unable to parse {0}")]
    Parse(String),

    #[error("computation interrupted before all permutations completed")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MvpaError {
    /// Attaches fold context to an error raised while processing a fold.
    pub fn in_fold(self, fold: usize, group: i64, permutation: Option<usize>) -> MvpaError {
        MvpaError::Fold { fold, group, permutation, source: Box::new(self) }
    }

    /// Walks down the `Fold` wrappers to the error that actually happened.
    pub fn root(&self) -> &MvpaError {
        match self {
            MvpaError::Fold { source, .. } => source.root(),
            other => other,
        }
    }
}

fn permutation_suffix(permutation: &Option<usize>) -> String {
    permutation.map(|p| format!(", permutation {}", p)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, MvpaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_context_is_displayed() {
        let err = MvpaError::Convergence("max iterations reached".to_string()).in_fold(2, 7, Some(13));
        let msg = err.to_string();
        assert!(msg.contains("fold 2"));
        assert!(msg.contains("group 7"));
        assert!(msg.contains("permutation 13"));
        assert!(msg.contains("max iterations reached"));
    }

    #[test]
    fn test_fold_context_without_permutation() {
        let err = MvpaError::UnscorableFold("single class".to_string()).in_fold(0, 1, None);
        assert!(!err.to_string().contains("permutation"));
    }

    #[test]
    fn test_root_unwraps_fold_context() {
        let err = MvpaError::MissingClass { present: 1, expected: 2 }.in_fold(1, 3, None);
        assert!(matches!(err.root(), MvpaError::MissingClass { present: 1, expected: 2 }));
    }
}
