use crate::classifier::ClassifierKind;
use crate::scoring::Scoring;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub preparation: Preparation,
    #[serde(default)]
    pub classifier: Classifier,
    #[serde(default)]
    pub cv: CV,
    #[serde(default)]
    pub permutation: Permutation,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "save_experiment_default")]
    pub save_exp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String,
    #[serde(default = "empty_string")]
    pub y: String,
    #[serde(default = "empty_string")]
    pub groups: String,
    #[serde(default = "false_default")]
    pub features_in_rows: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Preparation {
    /// Number of principal components kept after standardization, none to skip the projection
    #[serde(default = "none_default")]
    pub n_components: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Classifier {
    #[serde(default = "classifier_default")]
    pub algo: ClassifierKind,
    /// Inverse regularization strength
    #[serde(default = "c_default")]
    pub c: f64,
    #[serde(default = "max_iterations_default")]
    pub max_iterations: u64,
    #[serde(default = "tolerance_default")]
    pub tolerance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CV {
    #[serde(default = "scoring_default")]
    pub scoring: Scoring,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Permutation {
    #[serde(default = "n_permutations_default")]
    pub n_permutations: usize,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Preparation {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for CV {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Permutation {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

pub fn get(param_file: String) -> Result<Param, Box<dyn Error>> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<(), String> {
    if param.general.log_base.len() > 0 {
        param.general.display_colorful = false;
    }

    if param.general.thread_number == 0 {
        return Err("Invalid thread_number=0. At least one thread is required.".to_string());
    }

    if param.permutation.n_permutations == 0 {
        return Err("Invalid n_permutations=0. The permutation test needs at least one permutation.".to_string());
    }

    if param.preparation.n_components == Some(0) {
        return Err("Invalid n_components=0. Use null to disable the projection.".to_string());
    }

    validate_classifier(param)?;

    if param.permutation.n_permutations < 100 {
        warn!(
            "n_permutations={} gives a minimum attainable p-value of {:.3}. \
            Consider at least 1000 permutations for a stable null distribution.",
            param.permutation.n_permutations,
            1.0 / (param.permutation.n_permutations as f64 + 1.0)
        );
    }

    let paths = [&param.data.X, &param.data.y, &param.data.groups];
    let provided = paths.iter().filter(|p| !p.is_empty()).count();
    if provided != 0 && provided != paths.len() {
        return Err("X, y and groups must be provided together.".to_string());
    }

    Ok(())
}

fn validate_classifier(param: &Param) -> Result<(), String> {
    if !(param.classifier.c > 0.0) || !param.classifier.c.is_finite() {
        return Err(format!(
            "Invalid c={:.3}. Must be a finite value > 0.",
            param.classifier.c
        ));
    }

    if param.classifier.max_iterations == 0 {
        return Err("Invalid max_iterations=0. Must be >= 1.".to_string());
    }

    if !(param.classifier.tolerance > 0.0) {
        return Err(format!(
            "Invalid tolerance={:e}. Must be > 0.",
            param.classifier.tolerance
        ));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn save_experiment_default() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn one_default() -> usize {
    1
}
fn none_default() -> Option<usize> {
    None
}
fn classifier_default() -> ClassifierKind {
    ClassifierKind::logreg
}
fn c_default() -> f64 {
    1.0
}
fn max_iterations_default() -> u64 {
    1000
}
fn tolerance_default() -> f64 {
    1e-8
}
fn scoring_default() -> Scoring {
    Scoring::accuracy
}
fn n_permutations_default() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_param() {
        let param = Param::default();
        assert_eq!(param.general.seed, 4815162342);
        assert_eq!(param.general.thread_number, 1);
        assert_eq!(param.preparation.n_components, None);
        assert_eq!(param.classifier.algo, ClassifierKind::logreg);
        assert_eq!(param.classifier.c, 1.0);
        assert_eq!(param.cv.scoring, Scoring::accuracy);
        assert_eq!(param.permutation.n_permutations, 1000);
    }

    #[test]
    fn test_yaml_partial_sections_use_defaults() {
        let yaml = "
general:
  seed: 7
  thread_number: 4
preparation:
  n_components: 3
classifier:
  algo: svm
  c: 0.5
cv:
  scoring: auc
permutation:
  n_permutations: 250
";
        let mut param: Param = serde_yaml::from_str(yaml).unwrap();
        assert!(validate(&mut param).is_ok());
        assert_eq!(param.general.seed, 7);
        assert_eq!(param.general.log_level, "info");
        assert_eq!(param.preparation.n_components, Some(3));
        assert_eq!(param.classifier.algo, ClassifierKind::svm);
        assert_eq!(param.classifier.max_iterations, 1000);
        assert_eq!(param.cv.scoring, Scoring::auc);
        assert_eq!(param.permutation.n_permutations, 250);
    }

    #[test]
    fn test_yaml_null_components() {
        let param: Param = serde_yaml::from_str("preparation:\n  n_components: ~\n").unwrap();
        assert_eq!(param.preparation.n_components, None);
    }

    #[test]
    fn test_validate_rejects_zero_permutations() {
        let mut param = Param::default();
        param.permutation.n_permutations = 0;
        assert!(validate(&mut param).unwrap_err().contains("n_permutations"));
    }

    #[test]
    fn test_validate_rejects_zero_components() {
        let mut param = Param::default();
        param.preparation.n_components = Some(0);
        assert!(validate(&mut param).unwrap_err().contains("n_components"));
    }

    #[test]
    fn test_validate_rejects_bad_classifier_settings() {
        let mut param = Param::default();
        param.classifier.c = 0.0;
        assert!(validate(&mut param).unwrap_err().contains("c="));

        let mut param = Param::default();
        param.classifier.c = f64::NAN;
        assert!(validate(&mut param).is_err());

        let mut param = Param::default();
        param.classifier.max_iterations = 0;
        assert!(validate(&mut param).unwrap_err().contains("max_iterations"));

        let mut param = Param::default();
        param.classifier.tolerance = -1.0;
        assert!(validate(&mut param).unwrap_err().contains("tolerance"));
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let mut param = Param::default();
        param.general.thread_number = 0;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_requires_all_paths_together() {
        let mut param = Param::default();
        param.data.X = "X.tsv".to_string();
        param.data.y = "y.tsv".to_string();
        assert!(validate(&mut param).unwrap_err().contains("groups"));

        param.data.groups = "groups.tsv".to_string();
        assert!(validate(&mut param).is_ok());
    }

    #[test]
    fn test_validate_log_file_disables_colors() {
        let mut param = Param::default();
        param.general.log_base = "run".to_string();
        validate(&mut param).unwrap();
        assert!(!param.general.display_colorful);
    }

    #[test]
    fn test_get_reads_yaml_file() {
        let path = std::env::temp_dir().join("mvpa_test_get_reads_yaml_file.yaml");
        std::fs::write(&path, "permutation:\n  n_permutations: 99\n").unwrap();
        let param = get(path.to_string_lossy().to_string()).unwrap();
        assert_eq!(param.permutation.n_permutations, 99);
        std::fs::remove_file(&path).unwrap();

        let path = std::env::temp_dir().join("mvpa_test_get_rejects_invalid.yaml");
        std::fs::write(&path, "permutation:\n  n_permutations: 0\n").unwrap();
        assert!(get(path.to_string_lossy().to_string()).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
