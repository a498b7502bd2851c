//! Prediction persistence
//!
//! Every successful prediction is appended to a document store and later
//! read back by the history and stats endpoints. Records are immutable.

pub mod memory;
pub mod mongo;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::{Label, Prediction};
use crate::utils::error::{Error, Result};

pub use memory::MemoryPredictionStore;
pub use mongo::MongoPredictionStore;

/// Name of the collection predictions are written to
pub const PREDICTIONS_COLLECTION: &str = "predictions";

/// Database used when the connection string does not name one
pub const DEFAULT_DATABASE: &str = "pneumonia_db";

/// One stored prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub filename: String,
    pub result: Label,
    /// Probability of `result`, in [0, 1]
    pub confidence: f64,
    /// UTC, RFC 3339 with microseconds
    pub timestamp: String,
}

impl PredictionRecord {
    /// Build a record for `prediction`, stamped with the current time
    pub fn new(filename: impl Into<String>, prediction: &Prediction) -> Self {
        Self {
            filename: filename.into(),
            result: prediction.label,
            confidence: prediction.confidence as f64,
            timestamp: now_timestamp(),
        }
    }
}

/// Current UTC time in the stored timestamp format
///
/// Fixed width with a `Z` suffix, so string order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Append-only store of prediction records
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert(&self, record: &PredictionRecord) -> Result<()>;

    /// Most recent records first
    async fn query_recent(&self, limit: usize) -> Result<Vec<PredictionRecord>>;

    /// Number of records, optionally only those with the given label
    async fn count(&self, label: Option<Label>) -> Result<u64>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// Which store implementation the service should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongo,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Mongo => f.write_str("mongo"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreKind::Mongo),
            "memory" => Ok(StoreKind::Memory),
            other => Err(Error::Config(format!("Unknown prediction store: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: Label, confidence: f32) -> Prediction {
        Prediction {
            label,
            confidence,
            score: if label.is_positive() { confidence } else { 1.0 - confidence },
            inference_time_ms: 1.0,
        }
    }

    #[test]
    fn test_record_serialization() {
        let record = PredictionRecord {
            filename: "scan.png".to_string(),
            result: Label::Pneumonia,
            confidence: 0.93,
            timestamp: "2024-01-01T00:00:00.000000Z".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["filename"], "scan.png");
        assert_eq!(value["result"], "PNEUMONIA");
        assert_eq!(value["confidence"], 0.93);
        assert_eq!(value["timestamp"], "2024-01-01T00:00:00.000000Z");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_record_from_prediction() {
        let record = PredictionRecord::new("a.jpg", &prediction(Label::Normal, 0.75));
        assert_eq!(record.result, Label::Normal);
        assert!((record.confidence - 0.75).abs() < 1e-6);
        assert!(record.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let first = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = now_timestamp();
        assert_eq!(first.len(), second.len());
        assert!(first < second);
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("MongoDB".parse::<StoreKind>().unwrap(), StoreKind::Mongo);
        assert!("redis".parse::<StoreKind>().is_err());
    }
}
