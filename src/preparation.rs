use crate::error::{MvpaError, Result};
use crate::pca::Pca;
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Training standard deviations below this value mark a feature as degenerate
pub const DEGENERATE_STD: f64 = 1e-12;

/// Standardization (and optional PCA projection) learned from training rows only.
///
/// Nothing in this struct is ever derived from rows passed to [`transform`](Self::transform).
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePreparation {
    pub mean: Array1<f64>,
    /// Population standard deviation, 1 for degenerate features
    pub scale: Array1<f64>,
    /// Zero-variance features, output as 0 for every row
    pub degenerate: Vec<usize>,
    pub pca: Option<Pca>,
}

impl FeaturePreparation {
    pub fn fit(train: ArrayView2<f64>, n_components: Option<usize>) -> Result<FeaturePreparation> {
        let (n_train, n_features) = train.dim();
        let mean = train.mean_axis(Axis(0))
            .ok_or_else(|| MvpaError::InvalidParam("feature preparation needs at least one training row".to_string()))?;
        let std = train.std_axis(Axis(0), 0.0);

        let degenerate: Vec<usize> = std.iter()
            .enumerate()
            .filter(|(_, &s)| !(s > DEGENERATE_STD))
            .map(|(j, _)| j)
            .collect();

        if degenerate.len() == n_features {
            return Err(MvpaError::AllFeaturesDegenerate(n_features));
        }
        if !degenerate.is_empty() {
            warn!("{} of {} features have zero variance in the training rows and are set to 0",
                degenerate.len(), n_features);
            debug!("Degenerate features: {:?}", degenerate);
        }

        let scale = std.mapv(|s| if s > DEGENERATE_STD { s } else { 1.0 });

        let mut preparation = FeaturePreparation { mean, scale, degenerate, pca: None };

        if let Some(k) = n_components {
            let allowed = n_train.min(n_features);
            if k == 0 || k > allowed {
                return Err(MvpaError::RankExceeded {
                    requested: k,
                    allowed,
                    context: format!("{} training rows x {} features", n_train, n_features),
                });
            }
            let standardized = preparation.standardize(train);
            preparation.pca = Some(Pca::fit(standardized.view(), k)?);
        }

        Ok(preparation)
    }

    fn standardize(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = (&x - &self.mean) / &self.scale;
        for &j in &self.degenerate {
            out.column_mut(j).fill(0.0);
        }
        out
    }

    /// Applies the fitted centering, scaling and projection to any rows
    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let standardized = self.standardize(x);
        match &self.pca {
            Some(pca) => pca.transform(standardized.view()),
            None => standardized,
        }
    }

    /// Width of the transformed matrix
    pub fn n_outputs(&self) -> usize {
        match &self.pca {
            Some(pca) => pca.n_components(),
            None => self.mean.len(),
        }
    }
}
