use crate::cv::FoldResult;
use crate::param::Param;
use crate::permutation::PermutationResult;
use crate::utils::strip_ansi;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

/// Complete decoding analysis: configuration, data provenance and results
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e., output name, classifier and timestamp
    pub id: String,
    pub timestamp: String,
    /// Crate version and git hash used
    pub mvpa_version: String,
    pub parameters: Param,

    /// SHA-256 of the analysed table, see `Data::fingerprint`
    pub data_fingerprint: String,
    pub n_samples: usize,
    pub n_features: usize,
    /// Raw class labels, position = encoded index
    pub classes: Vec<i64>,
    /// Held-out group of each fold, in fold order
    pub groups: Vec<i64>,
    pub classifier: String,

    /// Train/held-out sample names per fold
    pub cv_folds_ids: Vec<(Vec<String>, Vec<String>)>,
    pub folds: Vec<FoldResult>,
    pub result: PermutationResult,

    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    /// Generates a formatted string displaying the experiment results.
    pub fn display_results(&self) -> String {
        let mut text = String::new();
        let scoring = self.parameters.cv.scoring;

        text.push_str(&format!("\n=============== Experiment {} ===============\n\n", self.id));
        text.push_str(&format!("mvpa version: v{}\n", self.mvpa_version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!("Parameters: \x1b[2;97m{:?}\x1b[0m\n", &self.parameters));
        text.push_str(&format!("Data: {} samples x {} features | classes {:?} | fingerprint {}\n",
            self.n_samples, self.n_features, self.classes,
            self.data_fingerprint.chars().take(12).collect::<String>()));

        let preparation = match self.parameters.preparation.n_components {
            Some(k) => format!("standardization + PCA ({} components)", k),
            None => "standardization".to_string(),
        };
        text.push_str(&format!("Pipeline: {} -> {} (C={})\n\n", preparation, self.classifier, self.parameters.classifier.c));

        text.push_str(&format!("\x1b[1;93mLeave-one-group-out cross-validation ({} folds)\x1b[0m\n", self.folds.len()));
        for (i, fold) in self.folds.iter().enumerate() {
            text.push_str(&format!("  Fold #{:<3} group {:<6} train {:<5} test {:<5} {} {:.3}\n",
                i + 1, fold.group, fold.n_train, fold.n_test, scoring, fold.score));
        }

        let result = &self.result;
        text.push_str(&format!("\nObserved {}: \x1b[1;97m{:.3}\x1b[0m\n", scoring, result.observed_score));
        text.push_str(&format!("Null distribution ({} permutations): {:.3} ± {:.3}\n",
            result.null_scores.len(), result.null_mean, result.null_std));

        let color = if result.p_value < 0.05 { "\x1b[1;92m" } else { "\x1b[1;91m" };
        text.push_str(&format!("p-value: {}{:.4}\x1b[0m (minimum attainable {:.4})\n",
            color, result.p_value, 1.0 / (result.null_scores.len() as f64 + 1.0)));

        if self.parameters.general.display_colorful { text } else { strip_ansi(&text) }
    }

    /// Writes the experiment in the format named by the file extension.
    ///
    /// An unknown extension is replaced by `.json`.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let path = path.as_ref();
        match ExperimentFormat::from_path(path) {
            Some(format) => std::fs::write(path, format.encode(self)?)?,
            None => {
                let json_path = path.with_extension("json");
                warn!("Unknown experiment extension for {}, writing {} instead", path.display(), json_path.display());
                std::fs::write(json_path, ExperimentFormat::Json.encode(self)?)?
            }
        }
        Ok(())
    }

    /// Reads an experiment written by [`Experiment::save_auto`].
    ///
    /// Without a known extension every format is tried, binary first.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        if let Some(format) = ExperimentFormat::from_path(path) {
            return format.decode(&bytes);
        }
        ExperimentFormat::FALLBACK_ORDER
            .iter()
            .find_map(|format| format.decode(&bytes).ok())
            .ok_or_else(|| format!("{} is not a json, yaml or bincode experiment", path.display()).into())
    }
}

/// On-disk encodings of an [`Experiment`]
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExperimentFormat {
    Json,
    Yaml,
    Bincode,
}

impl ExperimentFormat {
    const FALLBACK_ORDER: [ExperimentFormat; 3] = [ExperimentFormat::Bincode, ExperimentFormat::Json, ExperimentFormat::Yaml];

    fn from_path(path: &Path) -> Option<ExperimentFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(ExperimentFormat::Json),
            "yaml" | "yml" => Some(ExperimentFormat::Yaml),
            "bin" | "bincode" => Some(ExperimentFormat::Bincode),
            _ => None,
        }
    }

    fn encode(self, experiment: &Experiment) -> Result<Vec<u8>, Box<dyn Error>> {
        Ok(match self {
            ExperimentFormat::Json => serde_json::to_vec_pretty(experiment)?,
            ExperimentFormat::Yaml => serde_yaml::to_string(experiment)?.into_bytes(),
            ExperimentFormat::Bincode => bincode::serialize(experiment)?,
        })
    }

    fn decode(self, bytes: &[u8]) -> Result<Experiment, Box<dyn Error>> {
        Ok(match self {
            ExperimentFormat::Json => serde_json::from_slice(bytes)?,
            ExperimentFormat::Yaml => serde_yaml::from_slice(bytes)?,
            ExperimentFormat::Bincode => bincode::deserialize(bytes)?,
        })
    }
}
