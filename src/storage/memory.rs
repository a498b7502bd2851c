//! In-process prediction store, for tests and database-less runs

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PredictionRecord, PredictionStore};
use crate::inference::Label;
use crate::utils::error::Result;

#[derive(Debug, Default)]
pub struct MemoryPredictionStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl MemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for MemoryPredictionStore {
    async fn insert(&self, record: &PredictionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let records = self.records.read().await;
        let mut recent: Vec<PredictionRecord> = records.clone();
        // Stable sort keeps insertion order for equal timestamps; reverse puts the latest first
        recent.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        recent.reverse();
        recent.truncate(limit);
        Ok(recent)
    }

    async fn count(&self, label: Option<Label>) -> Result<u64> {
        let records = self.records.read().await;
        let n = match label {
            Some(label) => records.iter().filter(|r| r.result == label).count(),
            None => records.len(),
        };
        Ok(n as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
