use crate::alerting::BuildError;

use super::transport::Method;

/// Errors returned by Grafana API operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{method} {path} returned status {status}: {body}")]
    Http {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Dashboard not found")]
    DashboardNotFound,

    #[error("Alert not found")]
    AlertNotFound,

    #[error("Folder not found")]
    FolderNotFound,

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Wrap the error with a description of the failed operation
    pub fn context(self, context: impl Into<String>) -> Self {
        ClientError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, past any context wrapping
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the requested resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            ClientError::DashboardNotFound
                | ClientError::AlertNotFound
                | ClientError::FolderNotFound
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), ClientError::Cancelled)
    }
}
