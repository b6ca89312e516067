use crate::model_config::{PreprocessorConfig, TensorLayout};
use crate::prediction::softmax;
use image::{DynamicImage, RgbImage};
use ndarray::{Array, IxDyn};
use ort::inputs;

use ort::error::Error as OrtError;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionOutputs};
use std::path::Path;

pub const MODEL_FILE: &str = "model.onnx";

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] OrtError),
    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Invalid preprocessor configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid path for model files: {0}")]
    InvalidPath(String),
    #[error("Unsupported image format, expected JPEG or PNG")]
    UnsupportedFormat,
    #[error("Model output format unexpected")]
    OutputFormatUnexpected,
    #[error("Model returned an empty prediction")]
    EmptyPrediction,
    #[error("Model predicted class {index} but only {classes} labels are known")]
    UnknownClassIndex { index: usize, classes: usize },
}

/// Anything that turns a decoded image into one probability per class.
pub trait Classifier: Send + Sync {
    fn predict(&self, image: &DynamicImage) -> Result<Vec<f32>, ModelError>;

    fn model_version(&self) -> &str;
}

/// The pretrained leaf classifier, run through ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output_name: String,
    preprocessor_config: PreprocessorConfig,
}

impl OnnxClassifier {
    pub fn new(model_dir: &Path, intra_threads: usize) -> Result<Self, ModelError> {
        let model_path = model_dir.join(MODEL_FILE);
        if !model_path.exists() {
            return Err(ModelError::InvalidPath(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }

        let preprocessor_config = PreprocessorConfig::load(model_dir)?;

        tracing::info!(
            path = ?model_path,
            width = preprocessor_config.size.width,
            height = preprocessor_config.size.height,
            layout = ?preprocessor_config.layout,
            "loading ONNX model"
        );
        let session = SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(&model_path)?;

        let input_name = match &preprocessor_config.input_name {
            Some(name) => {
                if !session.inputs.iter().any(|input| &input.name == name) {
                    return Err(ModelError::InvalidConfig(format!(
                        "model has no input named {name:?}"
                    )));
                }
                name.clone()
            }
            None => first_input_name(session.inputs.iter().map(|input| input.name.as_str()))?,
        };
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or(ModelError::OutputFormatUnexpected)?;

        tracing::info!(input = %input_name, output = %output_name, "ONNX Runtime session created");

        Ok(Self {
            session,
            input_name,
            output_name,
            preprocessor_config,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, image: &DynamicImage) -> Result<Vec<f32>, ModelError> {
        let tensor = preprocess(image, &self.preprocessor_config);

        let inputs = inputs![self.input_name.as_str() => tensor.view()]?;
        let outputs: SessionOutputs = self.session.run(inputs)?;

        let output_value = outputs
            .get(&self.output_name)
            .ok_or(ModelError::OutputFormatUnexpected)?;

        // Shape is [1, num_classes].
        let scores_view = output_value.try_extract_tensor::<f32>()?;
        let scores: Vec<f32> = scores_view.iter().copied().collect();

        if self.preprocessor_config.apply_softmax {
            Ok(softmax(&scores))
        } else {
            Ok(scores)
        }
    }

    fn model_version(&self) -> &str {
        &self.preprocessor_config.model_version
    }
}

fn first_input_name<'a>(mut names: impl Iterator<Item = &'a str>) -> Result<String, ModelError> {
    names
        .next()
        .map(str::to_string)
        .ok_or_else(|| ModelError::InvalidConfig("model has no inputs".to_string()))
}

/// Resizes and rescales `image` into the batch-of-one tensor the model takes.
pub fn preprocess(image: &DynamicImage, config: &PreprocessorConfig) -> Array<f32, IxDyn> {
    let target_height = config.size.height;
    let target_width = config.size.width;

    let resized_image = image.resize_exact(
        target_width as u32,
        target_height as u32,
        image::imageops::FilterType::Triangle,
    );
    let rgb_image: RgbImage = resized_image.to_rgb8();

    let shape = match config.layout {
        TensorLayout::Nhwc => vec![1, target_height, target_width, 3],
        TensorLayout::Nchw => vec![1, 3, target_height, target_width],
    };
    let mut array = Array::<f32, _>::zeros(IxDyn(&shape));

    for (x, y, pixel) in rgb_image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let mut value = pixel[c] as f32;
            if config.do_rescale {
                value *= config.rescale_factor;
            } else {
                value /= 255.0;
            }
            if config.do_normalize {
                value = (value - config.image_mean[c]) / config.image_std[c];
            }

            match config.layout {
                TensorLayout::Nhwc => array[[0, y, x, c].as_slice()] = value,
                TensorLayout::Nchw => array[[0, c, y, x].as_slice()] = value,
            }
        }
    }

    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_config::ImageSize;
    use image::Rgb;

    fn two_tone() -> DynamicImage {
        // Left column red, right column white.
        let mut img = RgbImage::new(2, 2);
        for y in 0..2 {
            img.put_pixel(0, y, Rgb([255, 0, 0]));
            img.put_pixel(1, y, Rgb([255, 255, 255]));
        }
        DynamicImage::ImageRgb8(img)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-5, "{actual} != {expected}");
    }

    fn config(layout: TensorLayout) -> PreprocessorConfig {
        PreprocessorConfig {
            size: ImageSize { height: 2, width: 2 },
            layout,
            ..PreprocessorConfig::default()
        }
    }

    #[test]
    fn default_config_matches_model_input() {
        let tensor = preprocess(&two_tone(), &PreprocessorConfig::default());
        assert_eq!(tensor.shape(), &[1, 128, 128, 3]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn nhwc_keeps_channels_last() {
        let tensor = preprocess(&two_tone(), &config(TensorLayout::Nhwc));
        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        assert_close(tensor[[0usize, 0, 0, 0].as_slice()], 1.0);
        assert_close(tensor[[0usize, 0, 0, 1].as_slice()], 0.0);
        assert_close(tensor[[0usize, 1, 1, 2].as_slice()], 1.0);
    }

    #[test]
    fn nchw_puts_channels_first() {
        let tensor = preprocess(&two_tone(), &config(TensorLayout::Nchw));
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert_close(tensor[[0usize, 0, 1, 0].as_slice()], 1.0);
        assert_close(tensor[[0usize, 1, 1, 0].as_slice()], 0.0);
        assert_close(tensor[[0usize, 1, 1, 1].as_slice()], 1.0);
    }

    #[test]
    fn normalization_uses_mean_and_std() {
        let config = PreprocessorConfig {
            do_normalize: true,
            image_mean: [0.5; 3],
            image_std: [0.5; 3],
            ..config(TensorLayout::Nhwc)
        };
        let tensor = preprocess(&two_tone(), &config);
        assert_close(tensor[[0usize, 0, 0, 0].as_slice()], 1.0);
        assert_close(tensor[[0usize, 0, 0, 1].as_slice()], -1.0);
    }

    #[test]
    fn grayscale_and_alpha_inputs_become_rgb() {
        let gray = DynamicImage::new_luma8(5, 3);
        let tensor = preprocess(&gray, &config(TensorLayout::Nhwc));
        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);

        let rgba = DynamicImage::new_rgba8(7, 9);
        let tensor = preprocess(&rgba, &config(TensorLayout::Nchw));
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
    }

    #[test]
    fn graph_without_inputs_is_a_config_error() {
        let err = first_input_name(std::iter::empty()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(ref msg) if msg == "model has no inputs"));
        assert_eq!(first_input_name(["pixels", "mask"].into_iter()).unwrap(), "pixels");
    }

    #[test]
    fn missing_model_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxClassifier::new(dir.path(), 1).err().unwrap();
        assert!(matches!(err, ModelError::InvalidPath(_)));
    }
}
