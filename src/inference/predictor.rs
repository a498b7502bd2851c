//! Inference Predictor Module
//!
//! Composes the preprocessor, a score model and the decision threshold into
//! a single `predict` call used by both the HTTP service and the CLI.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision::{Decision, Label, Threshold};
use super::preprocess::{ImagePreprocessor, ImageTensor};
use crate::backend::{default_device, DefaultBackend};
use crate::model::{XrayClassifier, XrayClassifierConfig};
use crate::utils::error::{Error, Result};

/// Anything that maps one preprocessed image to P(PNEUMONIA)
pub trait ScoreModel: Send + Sync {
    fn score(&self, image: &ImageTensor) -> Result<f32>;

    /// Short description for logs and the health endpoint
    fn describe(&self) -> String;
}

/// `ScoreModel` backed by a Burn `XrayClassifier`
///
/// Burn modules are `Send` but not `Sync`, so the network sits behind a
/// mutex and forward passes are serialized.
pub struct BurnScoreModel<B: Backend> {
    model: Mutex<XrayClassifier<B>>,
    device: B::Device,
}

impl<B: Backend> BurnScoreModel<B> {
    pub fn new(model: XrayClassifier<B>, device: B::Device) -> Self {
        Self {
            model: Mutex::new(model),
            device,
        }
    }

    /// Load weights from disk with the serving architecture
    pub fn load(path: &Path, device: B::Device) -> Result<Self> {
        let config = XrayClassifierConfig::serving();
        let model = XrayClassifier::load(path, &config, &device)?;
        Ok(Self::new(model, device))
    }
}

impl<B: Backend> ScoreModel for BurnScoreModel<B> {
    fn score(&self, image: &ImageTensor) -> Result<f32> {
        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(image.data().to_vec(), image.shape()),
            &self.device,
        );

        let model = self
            .model
            .lock()
            .map_err(|_| Error::Inference("model lock poisoned".to_string()))?;

        let expected = model.input_size();
        let [_, _, height, width] = image.shape();
        if height != expected || width != expected {
            return Err(Error::Inference(format!(
                "model expects {}x{} input, got {}x{}",
                expected, expected, height, width
            )));
        }

        let probs = model
            .forward_probability(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Inference(format!("{:?}", e)))?;

        probs
            .first()
            .copied()
            .ok_or_else(|| Error::Inference("model returned no output".to_string()))
    }

    fn describe(&self) -> String {
        format!("XrayClassifier on {:?}", self.device)
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of `label`, in [0, 1]
    pub confidence: f32,
    /// Raw P(PNEUMONIA)
    pub score: f32,
    /// Preprocessing + forward pass time in milliseconds
    pub inference_time_ms: f64,
}

impl Prediction {
    fn new(decision: Decision, elapsed: Duration) -> Self {
        Self {
            label: decision.label,
            confidence: decision.confidence,
            score: decision.score,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Confidence as a percentage rounded to two decimals
    pub fn confidence_percent(&self) -> f64 {
        super::decision::round_percent(self.confidence as f64)
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Prediction: {}\n", self.label));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence_percent()));
        output.push_str(&format!("Raw score:  {:.4}\n", self.score));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));
        output
    }
}

/// Predictor for running inference with a loaded model
#[derive(Clone)]
pub struct Predictor {
    preprocessor: ImagePreprocessor,
    model: Arc<dyn ScoreModel>,
    threshold: Threshold,
}

impl Predictor {
    pub fn new(model: Arc<dyn ScoreModel>) -> Self {
        Self {
            preprocessor: ImagePreprocessor::default(),
            model,
            threshold: Threshold::default(),
        }
    }

    /// Load trained weights onto the default backend
    pub fn from_weights(path: &Path) -> Result<Self> {
        let model = BurnScoreModel::<DefaultBackend>::load(path, default_device())?;
        Ok(Self::new(Arc::new(model)))
    }

    /// Configure the decision threshold
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn describe(&self) -> String {
        self.model.describe()
    }

    /// Predict on an already preprocessed image
    pub fn predict_tensor(&self, image: &ImageTensor) -> Result<Decision> {
        let score = self.model.score(image)?;
        if !score.is_finite() {
            return Err(Error::Inference(format!("model produced non-finite score {}", score)));
        }
        Ok(self.threshold.decide(score))
    }

    /// Predict on an uploaded image buffer
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let start = Instant::now();
        let image = self.preprocessor.preprocess_bytes(bytes)?;
        let decision = self.predict_tensor(&image)?;
        let prediction = Prediction::new(decision, start.elapsed());

        debug!(
            label = %prediction.label,
            score = prediction.score,
            ms = prediction.inference_time_ms,
            "Prediction complete"
        );
        Ok(prediction)
    }

    /// Predict on an image from a file path
    pub fn predict_file(&self, path: &Path) -> Result<Prediction> {
        let start = Instant::now();
        let image = self.preprocessor.preprocess_file(path)?;
        let decision = self.predict_tensor(&image)?;
        Ok(Prediction::new(decision, start.elapsed()))
    }
}
