//! Application state shared by all handlers

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::inference::{Predictor, Threshold};
use crate::storage::{MemoryPredictionStore, MongoPredictionStore, PredictionStore, StoreKind};

use super::error::{Result, ServerError};

/// Shared application state
///
/// Built once at startup. A missing model or database leaves the
/// corresponding field empty and the dependent endpoints answer 503.
pub struct AppState {
    pub config: ServiceConfig,
    pub predictor: Option<Predictor>,
    pub store: Option<Arc<dyn PredictionStore>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        predictor: Option<Predictor>,
        store: Option<Arc<dyn PredictionStore>>,
    ) -> Self {
        Self {
            config,
            predictor,
            store,
            started_at: Instant::now(),
        }
    }

    /// Load the model and connect the store described by `config`
    pub async fn initialize(config: ServiceConfig) -> Self {
        let predictor = load_predictor(&config);
        let store = connect_store(&config).await;
        Self::new(config, predictor, store)
    }

    pub fn predictor(&self) -> Result<&Predictor> {
        self.predictor.as_ref().ok_or(ServerError::ModelUnavailable)
    }

    pub fn store(&self) -> Result<Arc<dyn PredictionStore>> {
        self.store.clone().ok_or(ServerError::DatabaseUnavailable)
    }

    pub fn model_loaded(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn database_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

fn load_threshold(path: Option<&Path>) -> Threshold {
    let Some(path) = path else {
        return Threshold::default();
    };
    match Threshold::from_file(path) {
        Ok(threshold) => {
            info!(path = %path.display(), threshold = %threshold, "Loaded decision threshold");
            threshold
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring threshold file, using default");
            Threshold::default()
        }
    }
}

fn load_predictor(config: &ServiceConfig) -> Option<Predictor> {
    match Predictor::from_weights(&config.model_path) {
        Ok(predictor) => {
            let predictor = predictor.with_threshold(load_threshold(config.threshold_file.as_deref()));
            info!(
                model = %predictor.describe(),
                threshold = %predictor.threshold(),
                "Model loaded"
            );
            Some(predictor)
        }
        Err(e) => {
            error!(
                path = %config.model_path.display(),
                error = %e,
                "Model unavailable, /predict is disabled"
            );
            None
        }
    }
}

async fn connect_store(config: &ServiceConfig) -> Option<Arc<dyn PredictionStore>> {
    match config.store {
        StoreKind::Memory => {
            info!("Using in-memory prediction store");
            Some(Arc::new(MemoryPredictionStore::new()))
        }
        StoreKind::Mongo => match MongoPredictionStore::connect(&config.mongo_uri).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "MongoDB unavailable, predictions will not be stored");
                None
            }
        },
    }
}
