//! Grafana Provisioner: Dashboards and Alert Rules as Code
//!
//! Builds Grafana dashboards and unified alerting rules from typed
//! configuration, then provisions them through Grafana's HTTP API while
//! keeping the alerts of each dashboard in sync with their definition.
//!
//! # Features
//!
//! - **Alert Rules**: Datasource and Azure Monitor queries, server-side expressions
//!   (math, reduce, resample, threshold, classic conditions)
//! - **Validation**: Builders return errors instead of provisioning broken rules
//! - **Dashboards**: Rows and panels, with alerts bound to their panel
//! - **Reconciliation**: Alerts matched by title are updated in place,
//!   new ones created, and removed ones deleted
//! - **Alert Manager**: Push notification routing configuration
//! - **Cancellation**: Every API operation can be aborted through a token
//!
//! # Example
//!
//! ```no_run
//! use grafana_provisioner::alerting::{
//!     AlertConfig, Command, ExpressionConfig, QueryConfig, ThresholdCondition,
//! };
//! use grafana_provisioner::client::{ClientConfig, GrafanaClient};
//! use grafana_provisioner::dashboard::{DashboardBuilder, DashboardConfig, PanelConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let alert = AlertConfig::default()
//!     .with_query(QueryConfig::new("A", "avg(rate(cpu_seconds_total[5m]))"))
//!     .with_expression(
//!         ExpressionConfig::new("B", Command::threshold("A", vec![ThresholdCondition::gt(0.8)]))
//!             .as_condition(),
//!     );
//!
//! let dashboard = DashboardBuilder::new("Service", DashboardConfig::default())?
//!     .panel(
//!         PanelConfig::new("CPU")
//!             .with_datasource("Prometheus")
//!             .with_alert("High CPU", alert),
//!     )?;
//!
//! let client = GrafanaClient::new(ClientConfig::from_env())?;
//! let cancel = CancellationToken::new();
//! let folder = client.get_folder_by_uid(&cancel, "services").await?;
//! let report = client.upsert_dashboard(&cancel, &folder, &dashboard).await?;
//! println!("Created alerts: {:?}", report.created);
//! # Ok(())
//! # }
//! ```

pub mod alerting;
pub mod client;
pub mod dashboard;
pub mod manifest;

// Re-export commonly used types
pub use alerting::{AlertConfig, AlertRule, BuildError};
pub use client::{ClientConfig, ClientError, GrafanaClient};
pub use dashboard::{DashboardBuilder, DashboardConfig};
pub use manifest::Manifest;
