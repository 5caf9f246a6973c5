//! Grafana HTTP API client
//!
//! Typed operations over a pluggable transport, plus dashboard provisioning
//! that keeps the alert rules defined on a dashboard in sync with Grafana.

pub mod config;
pub mod error;
pub mod grafana;
pub mod reconcile;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use error::ClientError;
pub use grafana::{AlertRef, DashboardRef, Datasource, Folder, GrafanaClient, ProvisionedRule};
pub use reconcile::{plan_reconciliation, ReconcilePlan, ReconcileReport};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
