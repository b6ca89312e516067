// src/labels.rs
use std::collections::BTreeMap;
use std::path::Path;

pub const CLASS_LABELS_FILE: &str = "class_labels.json";

#[derive(thiserror::Error, Debug)]
pub enum LabelError {
    #[error("I/O error reading class labels: {0}")]
    Io(#[from] std::io::Error),
    #[error("Class labels are not a JSON object of label to index: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Class labels file is empty")]
    Empty,
    #[error("Class index {index} is assigned to both {first:?} and {second:?}")]
    DuplicateIndex {
        index: usize,
        first: String,
        second: String,
    },
    #[error("Class indices must run from 0 to {expected_max} without gaps, missing {missing}")]
    MissingIndex { missing: usize, expected_max: usize },
}

/// Index to label mapping, the inverse of the `{label: index}` object the
/// training pipeline writes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let text = std::fs::read_to_string(path)?;
        let labels = Self::from_json_str(&text)?;
        tracing::info!(path = ?path, classes = labels.len(), "class labels loaded");
        Ok(labels)
    }

    pub fn from_json_str(text: &str) -> Result<Self, LabelError> {
        let raw: BTreeMap<String, usize> = serde_json::from_str(text)?;
        if raw.is_empty() {
            return Err(LabelError::Empty);
        }

        let mut by_index: BTreeMap<usize, String> = BTreeMap::new();
        for (label, index) in raw {
            let label = label.trim().to_string();
            if let Some(first) = by_index.insert(index, label.clone()) {
                return Err(LabelError::DuplicateIndex {
                    index,
                    first,
                    second: label,
                });
            }
        }

        let expected_max = by_index.len() - 1;
        if let Some(missing) = (0..=expected_max).find(|i| !by_index.contains_key(i)) {
            return Err(LabelError::MissingIndex {
                missing,
                expected_max,
            });
        }

        Ok(Self {
            labels: by_index.into_values().collect(),
        })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
