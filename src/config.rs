//! Service configuration
//!
//! Defaults are overlaid by environment variables in [`ServiceConfig::from_env`],
//! and the CLI overrides individual fields on top of that.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_MODEL_PATH;
use crate::storage::StoreKind;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/pneumonia_db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Runtime configuration of the HTTP service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Trained weights (`.mpk`, extension optional)
    pub model_path: PathBuf,
    pub mongo_uri: String,
    pub store: StoreKind,
    /// Uploaded files are copied here when set
    pub upload_dir: Option<PathBuf>,
    /// Only origin allowed by CORS; any origin when unset
    pub frontend_url: Option<String>,
    /// File holding a tuned decision threshold
    pub threshold_file: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            store: StoreKind::Mongo,
            upload_dir: Some(PathBuf::from(DEFAULT_UPLOAD_DIR)),
            frontend_url: None,
            threshold_file: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT")
            .or_else(|| get("BACKEND_PORT"))
            .and_then(|p| p.trim().parse().ok())
        {
            config.port = port;
        }
        if let Some(path) = get("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(uri) = get("MONGO_URI") {
            config.mongo_uri = uri;
        }
        if let Some(store) = get("PREDICTION_STORE").and_then(|s| s.parse().ok()) {
            config.store = store;
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            config.upload_dir = Some(PathBuf::from(dir));
        }
        if let Some(origin) = get("FRONTEND_URL") {
            config.frontend_url = Some(origin);
        }
        if let Some(path) = get("THRESHOLD_FILE") {
            config.threshold_file = Some(PathBuf::from(path));
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES").and_then(|s| s.trim().parse().ok()) {
            config.max_upload_bytes = bytes;
        }
        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
