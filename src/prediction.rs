use serde::Serialize;

use crate::labels::ClassLabels;
use crate::plant_model::ModelError;

pub fn softmax(data: &[f32]) -> Vec<f32> {
    let max_val = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = data.iter().map(|&x| (x - max_val).exp()).collect();
    let sum_exps: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum_exps).collect()
}

/// Index and value of the largest entry. Ties go to the lowest index; NaNs
/// never win.
pub fn argmax(data: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in data.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    /// `max(p) * 100`
    pub confidence_percent: f32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn from_probabilities(
        probabilities: Vec<f32>,
        labels: &ClassLabels,
    ) -> Result<Self, ModelError> {
        let (class_index, max_prob) = argmax(&probabilities).ok_or(ModelError::EmptyPrediction)?;
        let label = labels
            .get(class_index)
            .ok_or(ModelError::UnknownClassIndex {
                index: class_index,
                classes: labels.len(),
            })?
            .to_string();

        Ok(Self {
            class_index,
            label,
            confidence_percent: max_prob * 100.0,
            probabilities,
        })
    }

    /// Whole-percent value for a progress bar.
    pub fn progress_percent(&self) -> u8 {
        self.confidence_percent.clamp(0.0, 100.0) as u8
    }

    /// The `k` most likely classes, highest first. `k == 0` returns all.
    /// Scores without a label are skipped.
    pub fn top_k(&self, k: usize, labels: &ClassLabels) -> Vec<ClassScore> {
        let mut ranked: Vec<(usize, f32)> = self
            .probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, p)| *i < labels.len() && !p.is_nan())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let take = if k == 0 { ranked.len() } else { k };
        ranked
            .into_iter()
            .take(take)
            .filter_map(|(i, probability)| {
                labels.get(i).map(|label| ClassScore {
                    label: label.to_string(),
                    probability,
                })
            })
            .collect()
    }
}
