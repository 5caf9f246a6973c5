//! Grafana Provisioner CLI
//!
//! Run with: cargo run -- apply dashboards/checkout.json
//!
//! Environment variables:
//! - GRAFANA_URL: Grafana base URL (default: http://localhost:3000)
//! - GRAFANA_TOKEN: Service account token
//! - GRAFANA_USER / GRAFANA_PASSWORD: Basic auth, used when no token is set
//! - GRAFANA_TIMEOUT_SECS: Per-request timeout (default: 30)
//! - RUST_LOG: Log level (default: grafana_provisioner=info)
//!
//! Ctrl-C aborts the running operation. Steps already applied are kept;
//! running `apply` again converges.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grafana_provisioner::client::{ClientConfig, GrafanaClient};
use grafana_provisioner::Manifest;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grafana-provisioner", version, about = "Provision Grafana dashboards and their alert rules")]
struct Opts {
    #[command(subcommand)]
    cmd: Commands,

    #[arg(long, global = true, env = "GRAFANA_URL", help = "Grafana base URL")]
    url: Option<String>,

    #[arg(long, global = true, env = "GRAFANA_TOKEN", hide_env_values = true, help = "Service account token")]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a dashboard and reconcile its alerts
    Apply {
        /// Path to a JSON dashboard manifest
        manifest: PathBuf,
    },
    /// Delete a dashboard along with its alerts
    Delete {
        /// Dashboard UID
        uid: String,
    },
    /// List the alert rules linked to a dashboard
    Alerts {
        /// Dashboard UID
        uid: String,
    },
    /// Replace the alert manager configuration (contact points, policies)
    Alertmanager {
        /// Path to a JSON alert manager configuration
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grafana_provisioner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = Opts::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = opts.url {
        config.base_url = url;
    }
    if let Some(token) = opts.token.filter(|token| !token.is_empty()) {
        config.api_token = Some(token);
    }
    tracing::info!(url = %config.base_url, "Connecting to Grafana");

    let client = GrafanaClient::new(config).context("could not create Grafana client")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    match opts.cmd {
        Commands::Apply { manifest } => {
            let manifest = Manifest::load(&manifest)
                .with_context(|| format!("could not load manifest {}", manifest.display()))?;
            let folder_uid = manifest.folder_uid.clone();
            let dashboard = manifest.build()?;

            let folder = client
                .get_folder_by_uid(&cancel, &folder_uid)
                .await
                .with_context(|| format!("could not find folder {}", folder_uid))?;
            let report = client
                .upsert_dashboard(&cancel, &folder, &dashboard)
                .await
                .with_context(|| format!("could not provision dashboard {}", dashboard.title()))?;

            tracing::info!(
                uid = %report.dashboard.uid,
                url = %report.dashboard.url,
                created = report.created.len(),
                updated = report.updated.len(),
                deleted = report.deleted.len(),
                "Dashboard provisioned"
            );
        }
        Commands::Delete { uid } => {
            client
                .delete_dashboard(&cancel, &uid)
                .await
                .with_context(|| format!("could not delete dashboard {}", uid))?;
        }
        Commands::Alerts { uid } => {
            let alerts = client
                .list_alerts_for_dashboard(&cancel, &uid)
                .await
                .with_context(|| format!("could not list alerts of dashboard {}", uid))?;

            for alert in alerts {
                println!(
                    "{}\t{}\t{}/{}",
                    alert.uid, alert.title, alert.folder_uid, alert.rule_group
                );
            }
        }
        Commands::Alertmanager { config } => {
            let contents = std::fs::read_to_string(&config)
                .with_context(|| format!("could not read {}", config.display()))?;
            let body: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("could not parse {}", config.display()))?;

            client
                .configure_alert_manager(&cancel, &body)
                .await
                .context("could not configure alert manager")?;
        }
    }

    Ok(())
}
