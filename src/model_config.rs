// src/model_config.rs
use serde::Deserialize;
use std::path::Path;

use crate::plant_model::ModelError;

pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// How the preprocessed pixels are laid out in the input tensor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, what a Keras export expects.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub do_normalize: bool,
    pub do_rescale: bool,
    pub image_mean: [f32; 3],
    pub image_std: [f32; 3],
    pub rescale_factor: f32,
    pub size: ImageSize,
    pub layout: TensorLayout,
    /// Name of the graph input to feed; the first input is used when unset.
    pub input_name: Option<String>,
    /// Set when the exported graph ends in logits instead of a softmax layer.
    pub apply_softmax: bool,
    pub model_version: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub height: usize,
    pub width: usize,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            height: 128,
            width: 128,
        }
    }
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_normalize: false,
            do_rescale: true,
            image_mean: [0.0; 3],
            image_std: [1.0; 3],
            rescale_factor: 1.0 / 255.0,
            size: ImageSize::default(),
            layout: TensorLayout::default(),
            input_name: None,
            apply_softmax: false,
            model_version: "mobilenetv2-plantvillage".to_string(),
        }
    }
}

impl PreprocessorConfig {
    /// Reads `preprocessor_config.json` from `model_dir`, falling back to the
    /// defaults the classifier was trained with when the file is absent.
    pub fn load(model_dir: &Path) -> Result<Self, ModelError> {
        let path = model_dir.join(PREPROCESSOR_CONFIG_FILE);
        if !path.exists() {
            tracing::info!(path = ?path, "no preprocessor config, using defaults");
            return Ok(Self::default());
        }

        let file = std::fs::File::open(&path)?;
        let config: PreprocessorConfig = serde_json::from_reader(file)?;
        if config.size.width == 0 || config.size.height == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "input size must be non-zero, got {}x{}",
                config.size.width, config.size.height
            )));
        }
        if config.do_normalize && config.image_std.iter().any(|&s| s == 0.0) {
            return Err(ModelError::InvalidConfig(
                "image_std must not contain zeros".to_string(),
            ));
        }

        tracing::debug!(?config, "preprocessor config loaded");
        Ok(config)
    }
}
