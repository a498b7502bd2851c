//! MongoDB-backed prediction store

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use super::{PredictionRecord, PredictionStore, DEFAULT_DATABASE, PREDICTIONS_COLLECTION};
use crate::inference::Label;
use crate::utils::error::{Error, Result};

/// Give up on server selection quickly so a missing database degrades the
/// service at startup instead of hanging it
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MongoPredictionStore {
    database: Database,
    collection: Collection<PredictionRecord>,
}

impl MongoPredictionStore {
    /// Parse `uri`, connect and verify the server answers a ping
    pub async fn connect(uri: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        let collection = database.collection::<PredictionRecord>(PREDICTIONS_COLLECTION);

        let store = Self {
            database,
            collection,
        };
        store.ping().await?;

        info!(
            database = store.database.name(),
            collection = PREDICTIONS_COLLECTION,
            "Connected to MongoDB"
        );
        Ok(store)
    }

    fn label_filter(label: Option<Label>) -> Document {
        match label {
            Some(label) => doc! { "result": label.as_str() },
            None => doc! {},
        }
    }
}

#[async_trait]
impl PredictionStore for MongoPredictionStore {
    async fn insert(&self, record: &PredictionRecord) -> Result<()> {
        self.collection.insert_one(record, None).await?;
        debug!(filename = %record.filename, result = %record.result, "Stored prediction");
        Ok(())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .limit(limit as i64)
            .projection(doc! { "_id": 0 })
            .build();

        let cursor = self.collection.find(None, options).await?;
        let records: Vec<PredictionRecord> = cursor.try_collect().await?;
        Ok(records)
    }

    async fn count(&self, label: Option<Label>) -> Result<u64> {
        let n = self
            .collection
            .count_documents(Self::label_filter(label), None)
            .await?;
        Ok(n)
    }

    async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| Error::Persistence(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_filter() {
        assert_eq!(MongoPredictionStore::label_filter(None), doc! {});
        assert_eq!(
            MongoPredictionStore::label_filter(Some(Label::Pneumonia)),
            doc! { "result": "PNEUMONIA" }
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_uri() {
        let result = MongoPredictionStore::connect("not-a-mongo-uri").await;
        assert!(matches!(result, Err(Error::Persistence(_))));
    }
}
