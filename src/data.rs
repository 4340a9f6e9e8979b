use crate::error::{MvpaError, Result};
use crate::utils::distinct_sorted;
use log::{info, warn};
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// In-memory observation table: one row per trial, with its class label and run.
#[derive(Clone, PartialEq)]
pub struct Data {
    pub X: Array2<f64>,          // Trials x features
    pub labels: Vec<i64>,        // Raw class labels
    pub y: Vec<usize>,           // Labels encoded as indices into `classes`
    pub groups: Vec<i64>,        // Run / block identifier of each trial
    pub classes: Vec<i64>,       // Distinct raw labels, ascending
    pub features: Vec<String>,
    pub samples: Vec<String>,
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    /// Build a table from a feature matrix and per-row labels and groups.
    ///
    /// Labels are encoded in ascending order of their raw value. Samples and
    /// features receive generated names.
    pub fn from_parts(X: Array2<f64>, labels: Vec<i64>, groups: Vec<i64>) -> Result<Data> {
        if X.nrows() != labels.len() || X.nrows() != groups.len() {
            return Err(MvpaError::DimensionMismatch {
                rows: X.nrows(),
                labels: labels.len(),
                groups: groups.len(),
            });
        }

        let (sample_len, feature_len) = X.dim();
        let classes = distinct_sorted(&labels);
        let y = encode_labels(&labels, &classes);

        Ok(Data {
            X,
            labels,
            y,
            groups,
            classes,
            features: (0..feature_len).map(|j| format!("feature{}", j + 1)).collect(),
            samples: (0..sample_len).map(|i| format!("sample{}", i + 1)).collect(),
            feature_len,
            sample_len,
        })
    }

    /// Load a table from three TSV files.
    ///
    /// `X_path` holds the features (first column and header row are names),
    /// `y_path` and `groups_path` map each sample name to an integer.
    pub fn load_data<P: AsRef<Path>>(X_path: P, y_path: P, groups_path: P, features_in_rows: bool) -> Result<Data> {
        info!("Loading files {}, {} and {}...",
            X_path.as_ref().display(), y_path.as_ref().display(), groups_path.as_ref().display());

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(X_path.as_ref())?;

        let header: Vec<String> = reader.headers()?.iter().skip(1).map(String::from).collect();
        let mut row_names: Vec<String> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let name = fields.next().unwrap_or_default().to_string();
            let mut count = 0;
            for field in fields {
                let value: f64 = field.trim().parse()
                    .map_err(|_| MvpaError::Parse(format!("value '{}' of row {} in {}", field, name, X_path.as_ref().display())))?;
                values.push(value);
                count += 1;
            }
            if count != header.len() {
                return Err(MvpaError::Parse(format!("row {} has {} values, header announces {}", name, count, header.len())));
            }
            row_names.push(name);
        }

        let table = Array2::from_shape_vec((row_names.len(), header.len()), values)
            .map_err(|e| MvpaError::Parse(e.to_string()))?;

        let (X, samples, features) = if features_in_rows {
            (table.reversed_axes().as_standard_layout().to_owned(), header, row_names)
        } else {
            (table, row_names, header)
        };

        let label_map = read_sample_column(y_path.as_ref())?;
        let group_map = read_sample_column(groups_path.as_ref())?;

        let labels = samples.iter()
            .map(|s| label_map.get(s).copied().ok_or_else(|| MvpaError::MissingSample(format!("{} (labels)", s))))
            .collect::<Result<Vec<i64>>>()?;
        let groups = samples.iter()
            .map(|s| group_map.get(s).copied().ok_or_else(|| MvpaError::MissingSample(format!("{} (groups)", s))))
            .collect::<Result<Vec<i64>>>()?;

        let mut data = Data::from_parts(X, labels, groups)?;
        data.samples = samples;
        data.features = features;
        Ok(data)
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Distinct group ids in ascending order
    pub fn group_ids(&self) -> Vec<i64> {
        distinct_sorted(&self.groups)
    }

    /// Number of rows of each encoded class
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];
        for &c in &self.y {
            counts[c] += 1;
        }
        counts
    }

    /// Logs every run that lacks one of the classes, returns how many do
    pub fn check_group_balance(&self) -> usize {
        let mut unbalanced = 0;
        for group in self.group_ids() {
            let mut present = vec![false; self.n_classes()];
            for (i, _) in self.groups.iter().enumerate().filter(|(_, &g)| g == group) {
                present[self.y[i]] = true;
            }
            let missing: Vec<i64> = present.iter().enumerate()
                .filter(|(_, &p)| !p)
                .map(|(c, _)| self.classes[c])
                .collect();
            if !missing.is_empty() {
                warn!("Group {} has no observation of class(es) {:?}", group, missing);
                unbalanced += 1;
            }
        }
        unbalanced
    }

    /// SHA-256 of the matrix shape, values, labels and groups
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.sample_len as u64).to_le_bytes());
        hasher.update((self.feature_len as u64).to_le_bytes());
        for v in self.X.iter() {
            hasher.update(v.to_le_bytes());
        }
        for l in &self.labels {
            hasher.update(l.to_le_bytes());
        }
        for g in &self.groups {
            hasher.update(g.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

fn encode_labels(labels: &[i64], classes: &[i64]) -> Vec<usize> {
    let index: HashMap<i64, usize> = classes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
    labels.iter().map(|l| index[l]).collect()
}

/// Reads a `sample<TAB>integer` file with a header line
fn read_sample_column(path: &Path) -> Result<HashMap<String, i64>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut map = HashMap::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(sample), Some(value)) = (record.get(0), record.get(1)) {
            let value: i64 = value.trim().parse()
                .map_err(|_| MvpaError::Parse(format!("value '{}' for sample {} in {}", value, sample, path.display())))?;
            map.insert(sample.to_string(), value);
        }
    }
    Ok(map)
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Features: {}   Samples: {}   Groups: {}   Classes: {:?} {:?}",
            self.feature_len, self.sample_len, self.group_ids().len(), self.classes, self.class_counts())?;

        // Limit to the first 10 trials
        for i in (0..self.sample_len).take(10) {
            let row: String = self.X.row(i).iter()
                .take(8)
                .map(|v| format!("{:.2}", v))
                .collect::<Vec<_>>()
                .join("\t");
            let ellipsis = if self.feature_len > 8 { "\t..." } else { "" };
            writeln!(f, "{:<12} y={:<3} g={:<3} {}{}", self.samples[i], self.labels[i], self.groups[i], row, ellipsis)?;
        }
        if self.sample_len > 10 {
            writeln!(f, "... ({} more samples)", self.sample_len - 10)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
