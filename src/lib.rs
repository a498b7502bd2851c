//! # Pneumoscan
//!
//! Chest X-ray pneumonia classification served over HTTP, built on the Burn
//! framework.
//!
//! ## Features
//!
//! - **Binary CNN classifier** mapping a 128x128 RGB image to P(PNEUMONIA)
//! - **Threshold decision layer** reporting the probability of the predicted class
//! - **REST API** with upload validation, history and stats
//! - **MongoDB persistence** of every prediction, or an in-memory store
//!
//! ## Modules
//!
//! - `model`: CNN architecture and weight loading
//! - `inference`: Preprocessing, decision layer, predictor and directory evaluation
//! - `storage`: Prediction records and the store implementations
//! - `server`: Axum router, handlers and shared state
//! - `config`: Service configuration from defaults and environment
//! - `utils`: Logging, metrics and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pneumoscan::inference::Predictor;
//!
//! let predictor = Predictor::from_weights("model/pneumonia_model.mpk".as_ref())?;
//! let prediction = predictor.predict_file("scan.jpeg".as_ref())?;
//! println!("{} ({:.2}%)", prediction.label, prediction.confidence_percent());
//! ```

pub mod backend;
pub mod config;
pub mod inference;
pub mod model;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::ServiceConfig;
pub use inference::{Label, Prediction, Predictor, ScoreModel, Threshold};
pub use model::{XrayClassifier, XrayClassifierConfig};
pub use storage::{PredictionRecord, PredictionStore};
pub use utils::error::{Error, Result};
pub use utils::metrics::{BinaryConfusionMatrix, BinaryMetrics};

/// Side length of the square model input
pub const IMAGE_SIZE: usize = 128;

/// RGB input
pub const IMAGE_CHANNELS: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
