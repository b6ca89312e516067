use image::{DynamicImage, ImageFormat};
use std::sync::Arc;
use std::time::Instant;

use crate::disease_info::{self, DiseaseInfo};
use crate::labels::ClassLabels;
use crate::plant_model::{Classifier, ModelError};
use crate::prediction::Prediction;

/// Outcome of one upload: the prediction plus its reference card, if any.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub prediction: Prediction,
    pub info: Option<&'static DiseaseInfo>,
    pub model_version: String,
}

/// Shared, cheaply clonable handle over the loaded classifier and labels.
#[derive(Clone)]
pub struct Detector {
    classifier: Arc<dyn Classifier>,
    labels: Arc<ClassLabels>,
}

impl Detector {
    pub fn new(classifier: Arc<dyn Classifier>, labels: ClassLabels) -> Self {
        Self {
            classifier,
            labels: Arc::new(labels),
        }
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn model_version(&self) -> &str {
        self.classifier.model_version()
    }

    /// Decodes a JPEG/PNG upload and classifies it. Blocking.
    pub fn diagnose(&self, bytes: &[u8]) -> Result<Diagnosis, ModelError> {
        let image = decode_upload(bytes)?;
        self.diagnose_image(&image)
    }

    pub fn diagnose_image(&self, image: &DynamicImage) -> Result<Diagnosis, ModelError> {
        let started = Instant::now();
        let probabilities = self.classifier.predict(image)?;
        let prediction = Prediction::from_probabilities(probabilities, &self.labels)?;
        let info = disease_info::lookup(&prediction.label);

        tracing::info!(
            class = %prediction.label,
            confidence = %format!("{:.2}", prediction.confidence_percent),
            elapsed_ms = started.elapsed().as_millis() as u64,
            has_info = info.is_some(),
            "leaf classified"
        );

        Ok(Diagnosis {
            prediction,
            info,
            model_version: self.classifier.model_version().to_string(),
        })
    }
}

/// Only JPEG and PNG uploads are accepted.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, ModelError> {
    let format = image::guess_format(bytes).map_err(|_| ModelError::UnsupportedFormat)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(ModelError::UnsupportedFormat);
    }
    Ok(image::load_from_memory_with_format(bytes, format)?)
}
