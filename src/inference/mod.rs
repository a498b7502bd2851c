//! Inference module: preprocessing, model scoring and the label decision
//!
//! This module provides:
//! - Image decoding and preprocessing to the fixed model resolution
//! - The threshold-based decision layer
//! - A `Predictor` tying both to a loaded model
//! - Directory evaluation against labeled data

pub mod decision;
pub mod evaluate;
pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use decision::{Decision, Label, Threshold};
pub use evaluate::{evaluate_directory, EvaluationReport};
pub use predictor::{BurnScoreModel, Prediction, Predictor, ScoreModel};
pub use preprocess::{is_allowed_extension, ImagePreprocessor, ImageTensor, ALLOWED_EXTENSIONS};
