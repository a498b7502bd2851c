//! Model module for the CNN architecture using the Burn framework
//!
//! This module provides:
//! - The binary chest X-ray classifier
//! - Architecture configuration
//! - Weight loading and saving via Burn's `CompactRecorder`

pub mod cnn;
pub mod config;

// Re-export main types for convenience
pub use cnn::{resolve_weights_path, XrayClassifier};
pub use config::XrayClassifierConfig;

/// Default location of the trained weights
pub const DEFAULT_MODEL_PATH: &str = "model/pneumonia_model.mpk";
