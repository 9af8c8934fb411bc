use std::path::Path;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Load configuration from an optional JSON file
///
/// Without a path the defaults are returned. Keys missing from the file fall
/// back to their defaults.
pub async fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let config: AppConfig = serde_json::from_str(&raw).map_err(|e| {
        AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
