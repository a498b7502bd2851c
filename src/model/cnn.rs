//! CNN Model Architecture for Pneumonia Classification
//!
//! This module implements a Convolutional Neural Network using the Burn framework
//! that maps a single 128x128 RGB chest X-ray to the probability of pneumonia.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    record::CompactRecorder,
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};
use tracing::{debug, info};

use super::config::XrayClassifierConfig;
use crate::utils::error::{Error, Result};

/// File extension appended by `CompactRecorder`
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// A convolution block: 3x3 valid Conv2d, BatchNorm, ReLU, 2x2 MaxPool, Dropout
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: MaxPool2d,
    pub dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, dropout: f64, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

/// Pneumonia classifier CNN
///
/// Architecture:
/// - 3 convolutional blocks (32, 64, 128 filters)
/// - Flatten
/// - Dense 256 -> Dense 128, each with ReLU and dropout
/// - Single output unit; sigmoid gives P(PNEUMONIA)
///
/// Dropout is only active on autodiff backends, so forward passes on the
/// serving backend are deterministic.
#[derive(Module, Debug)]
pub struct XrayClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub hidden: Vec<Linear<B>>,
    pub dense_dropout: Dropout,
    pub output: Linear<B>,
    input_size: usize,
}

impl<B: Backend> XrayClassifier<B> {
    /// Create a new classifier with freshly initialized weights
    pub fn new(config: &XrayClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_filters.len());
        let mut channels = config.in_channels;
        for &filters in &config.conv_filters {
            blocks.push(ConvBlock::new(channels, filters, config.conv_dropout, device));
            channels = filters;
        }

        let mut hidden = Vec::with_capacity(config.dense_units.len());
        let mut features = config.flattened_features();
        for &units in &config.dense_units {
            hidden.push(LinearConfig::new(features, units).init(device));
            features = units;
        }

        Self {
            blocks,
            hidden,
            dense_dropout: DropoutConfig::new(config.dense_dropout).init(),
            output: LinearConfig::new(features, 1).init(device),
            input_size: config.input_size,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, 1]
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 2> {
        for block in &self.blocks {
            x = block.forward(x);
        }

        // Flatten: [B, C, H, W] -> [B, C*H*W]
        let [batch_size, channels, height, width] = x.dims();
        let mut x: Tensor<B, 2> = x.reshape([batch_size, channels * height * width]);

        for layer in &self.hidden {
            x = layer.forward(x);
            x = Relu::new().forward(x);
            x = self.dense_dropout.forward(x);
        }

        self.output.forward(x)
    }

    /// Forward pass with sigmoid, giving P(PNEUMONIA) per batch item
    pub fn forward_probability(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }

    /// Input resolution the network was built for
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Load trained weights recorded with `CompactRecorder`
    pub fn load(path: &Path, config: &XrayClassifierConfig, device: &B::Device) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let weights = resolve_weights_path(path)
            .ok_or_else(|| Error::PathNotFound(path.to_path_buf()))?;

        debug!("Loading classifier weights from {:?}", weights);
        let recorder = CompactRecorder::new();
        let model = Self::new(config, device)
            .load_file(weights.clone(), &recorder, device)
            .map_err(|e| Error::Model(format!("Failed to load model from {:?}: {:?}", weights, e)))?;

        info!(path = %weights.display(), "Classifier weights loaded");
        Ok(model)
    }

    /// Save the weights with `CompactRecorder` (adds the `.mpk` extension)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let recorder = CompactRecorder::new();
        self.clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| Error::Model(format!("Failed to save model to {:?}: {:?}", path, e)))
    }
}

/// Find the weights file, accepting the path with or without `.mpk`
pub fn resolve_weights_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let with_ext = path.with_extension(WEIGHTS_EXTENSION);
    if with_ext.is_file() {
        return Some(with_ext);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = XrayClassifierConfig::serving();
        let model = XrayClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 128, 128], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 1]);
    }

    #[test]
    fn test_probability_in_unit_interval() {
        let device = Default::default();
        let config = XrayClassifierConfig::serving();
        let model = XrayClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 128, 128], &device);
        let probs: Vec<f32> = model
            .forward_probability(input)
            .into_data()
            .to_vec()
            .unwrap();

        assert_eq!(probs.len(), 1);
        assert!((0.0..=1.0).contains(&probs[0]));
    }

    #[test]
    fn test_save_and_load_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pneumonia_model");
        let device = Default::default();
        let config = XrayClassifierConfig::serving();

        let model = XrayClassifier::<TestBackend>::new(&config, &device);
        model.save(&path).unwrap();

        let loaded = XrayClassifier::<TestBackend>::load(&path, &config, &device).unwrap();

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 128, 128], &device);
        let before: Vec<f32> = model.forward_probability(input.clone()).into_data().to_vec().unwrap();
        let after: Vec<f32> = loaded.forward_probability(input).into_data().to_vec().unwrap();

        // CompactRecorder stores half precision
        assert!((before[0] - after[0]).abs() < 5e-2);
    }

    #[test]
    fn test_load_missing_file() {
        let device = Default::default();
        let config = XrayClassifierConfig::serving();
        let result = XrayClassifier::<TestBackend>::load(
            Path::new("/nonexistent/pneumonia_model.mpk"),
            &config,
            &device,
        );

        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }
}
