//! Dashboard manifests
//!
//! A manifest is a JSON document naming the folder a dashboard is
//! provisioned in and describing the dashboard with its alerts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alerting::BuildError;
use crate::dashboard::{DashboardBuilder, DashboardDefinition};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    Invalid(String),

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub folder_uid: String,
    pub dashboard: DashboardDefinition,
}

impl Manifest {
    /// Read and validate a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.folder_uid.trim().is_empty() {
            return Err(ManifestError::Invalid("folder_uid must not be empty".to_string()));
        }
        Ok(manifest)
    }

    /// Build the described dashboard, validating every alert on it
    pub fn build(self) -> Result<DashboardBuilder, ManifestError> {
        Ok(self.dashboard.build()?)
    }
}
