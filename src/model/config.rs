//! Model Configuration Module
//!
//! Architecture hyperparameters for the X-ray classifier. The serving
//! resolution is fixed; weights trained for another size will not load.

use burn::config::Config;

use crate::{IMAGE_CHANNELS, IMAGE_SIZE};

/// Configuration for the XrayClassifier CNN
#[derive(Config, Debug, PartialEq)]
pub struct XrayClassifierConfig {
    /// Input image size (width and height, assumed square)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Output channels of each 3x3 convolution block
    #[config(default = "vec![32, 64, 128]")]
    pub conv_filters: Vec<usize>,

    /// Hidden units of the fully connected head
    #[config(default = "vec![256, 128]")]
    pub dense_units: Vec<usize>,

    /// Dropout applied after each convolution block
    #[config(default = "0.25")]
    pub conv_dropout: f64,

    /// Dropout applied after each hidden dense layer
    #[config(default = "0.5")]
    pub dense_dropout: f64,
}

impl XrayClassifierConfig {
    /// The configuration the service is deployed with
    pub fn serving() -> Self {
        Self::new()
            .with_input_size(IMAGE_SIZE)
            .with_in_channels(IMAGE_CHANNELS)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.in_channels == 0 {
            return Err("in_channels must be greater than 0".to_string());
        }

        if self.conv_filters.is_empty() {
            return Err("conv_filters must have at least one layer".to_string());
        }

        if self.dense_units.is_empty() {
            return Err("dense_units must have at least one layer".to_string());
        }

        for rate in [self.conv_dropout, self.dense_dropout] {
            if !(0.0..1.0).contains(&rate) {
                return Err("dropout rates must be in range [0.0, 1.0)".to_string());
            }
        }

        if self.feature_map_size() == 0 {
            return Err(format!(
                "input_size {} is too small for {} convolution blocks",
                self.input_size,
                self.conv_filters.len()
            ));
        }

        Ok(())
    }

    /// Spatial size after all conv blocks
    ///
    /// Each block is a 3x3 valid convolution (-2) followed by a 2x2 max pool
    /// with stride 2 (floor division).
    pub fn feature_map_size(&self) -> usize {
        self.conv_filters
            .iter()
            .fold(self.input_size, |size, _| size.saturating_sub(2) / 2)
    }

    /// Number of features entering the dense head after flattening
    pub fn flattened_features(&self) -> usize {
        let size = self.feature_map_size();
        let channels = *self.conv_filters.last().unwrap_or(&0);
        size * size * channels
    }
}
