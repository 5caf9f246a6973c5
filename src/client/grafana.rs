//! Typed Grafana API operations

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

use super::config::ClientConfig;
use super::error::ClientError;
use super::transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
use crate::alerting::{AlertRule, CUSTOM_DASHBOARD_REF_ANNOTATION, DASHBOARD_UID_ANNOTATION};
use crate::dashboard::Board;

pub(crate) const ALERT_RULES_PATH: &str = "/api/v1/provisioning/alert-rules";

pub(crate) const ALERT_MANAGER_CONFIG_PATH: &str = "/api/alertmanager/grafana/config/api/v1/alerts";

/// Characters escaped in path segments and query values
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn escape(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Dashboard as returned by search and save endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardRef {
    pub id: u64,
    pub uid: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub is_starred: bool,
    pub folder_id: u64,
    pub folder_uid: String,
    pub folder_title: String,
    pub version: u64,
}

/// Folder dashboards and alert rules are stored in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    pub id: u64,
    pub uid: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Datasource {
    #[serde(default)]
    pub id: u64,
    pub uid: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Alert rule as stored by Grafana. Only identity and placement are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionedRule {
    pub uid: String,
    pub title: String,
    #[serde(rename = "folderUID")]
    pub folder_uid: String,
    pub rule_group: String,
    pub condition: String,
    #[serde(deserialize_with = "null_as_default")]
    pub annotations: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    pub updated: Option<DateTime<Utc>>,
}

fn null_as_default<'de, D, V>(deserializer: D) -> Result<V, D::Error>
where
    D: Deserializer<'de>,
    V: Default + Deserialize<'de>,
{
    Ok(Option::<V>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProvisionedRule {
    /// UID of the dashboard this rule was provisioned with, if any
    pub fn dashboard_uid(&self) -> Option<&str> {
        [DASHBOARD_UID_ANNOTATION, CUSTOM_DASHBOARD_REF_ANNOTATION]
            .iter()
            .filter_map(|key| self.annotations.get(*key))
            .map(String::as_str)
            .find(|uid| !uid.is_empty())
    }
}

/// Reference to an existing alert rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRef {
    pub uid: String,
    pub title: String,
    pub folder_uid: String,
    pub rule_group: String,
}

impl From<ProvisionedRule> for AlertRef {
    fn from(rule: ProvisionedRule) -> Self {
        Self {
            uid: rule.uid,
            title: rule.title,
            folder_uid: rule.folder_uid,
            rule_group: rule.rule_group,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveDashboardRequest<'a> {
    dashboard: &'a Board,
    folder_id: u64,
    overwrite: bool,
}

#[derive(Deserialize)]
struct DashboardEnvelope {
    dashboard: Board,
}

/// Grafana API client.
///
/// Every operation takes a cancellation token; once it fires, the pending
/// request is abandoned and the operation returns `ClientError::Cancelled`.
/// Steps completed before cancellation are not rolled back.
#[derive(Debug, Clone)]
pub struct GrafanaClient<T = ReqwestTransport> {
    transport: T,
}

impl GrafanaClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::with_transport(ReqwestTransport::new(config)?))
    }
}

impl<T: Transport> GrafanaClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request unless the token fires first
    async fn send(
        &self,
        cancel: &CancellationToken,
        request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            response = self.transport.send(request) => response,
        }
    }

    /// Send a request and turn unexpected statuses into errors.
    /// A 404 maps to `not_found` when one is given.
    async fn call(
        &self,
        cancel: &CancellationToken,
        request: ApiRequest,
        accepted: &[u16],
        not_found: Option<ClientError>,
    ) -> Result<ApiResponse, ClientError> {
        let method = request.method;
        let path = request.path.clone();
        let response = self.send(cancel, request).await?;

        if accepted.contains(&response.status) {
            return Ok(response);
        }
        if response.status == 404 {
            if let Some(err) = not_found {
                return Err(err);
            }
        }

        Err(ClientError::Http {
            method,
            path,
            status: response.status,
            body: response.text(),
        })
    }

    /// Find a dashboard by UID
    pub async fn get_dashboard_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<Board, ClientError> {
        let request = ApiRequest::get(format!("/api/dashboards/uid/{}", escape(uid)));
        let response = self
            .call(cancel, request, &[200], Some(ClientError::DashboardNotFound))
            .await?;

        let envelope: DashboardEnvelope = response.json()?;
        Ok(envelope.dashboard)
    }

    /// Find a dashboard by title, case-insensitively
    pub async fn get_dashboard_by_title(
        &self,
        cancel: &CancellationToken,
        title: &str,
    ) -> Result<DashboardRef, ClientError> {
        let request = ApiRequest::get(format!("/api/search?type=dash-db&query={}", escape(title)));
        let response = self.call(cancel, request, &[200], None).await?;

        let dashboards: Vec<DashboardRef> = response.json()?;
        dashboards
            .into_iter()
            .find(|dashboard| dashboard.title.to_lowercase() == title.to_lowercase())
            .ok_or(ClientError::DashboardNotFound)
    }

    /// Find a folder by UID
    pub async fn get_folder_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<Folder, ClientError> {
        let request = ApiRequest::get(format!("/api/folders/{}", escape(uid)));
        let response = self
            .call(cancel, request, &[200], Some(ClientError::FolderNotFound))
            .await?;
        response.json()
    }

    /// Map of datasource names to their UIDs
    pub async fn datasources_uid_map(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, ClientError> {
        let response = self
            .call(cancel, ApiRequest::get("/api/datasources"), &[200], None)
            .await?;

        let datasources: Vec<Datasource> = response.json()?;
        Ok(datasources
            .into_iter()
            .map(|datasource| (datasource.name, datasource.uid))
            .collect())
    }

    /// Save a dashboard document into a folder, replacing any previous version
    pub async fn persist_dashboard(
        &self,
        cancel: &CancellationToken,
        folder: &Folder,
        board: &Board,
    ) -> Result<DashboardRef, ClientError> {
        let body = SaveDashboardRequest {
            dashboard: board,
            folder_id: folder.id,
            overwrite: true,
        };
        let request = ApiRequest::json(Method::Post, "/api/dashboards/db", &body)?;
        let response = self.call(cancel, request, &[200], None).await?;

        let mut saved: DashboardRef = response.json()?;
        if saved.title.is_empty() {
            saved.title = board.title.clone();
        }

        tracing::info!(
            uid = %saved.uid,
            title = %saved.title,
            folder_uid = %folder.uid,
            "Dashboard persisted"
        );
        Ok(saved)
    }

    /// Every alert rule known to Grafana
    pub async fn list_alerts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProvisionedRule>, ClientError> {
        let response = self
            .call(cancel, ApiRequest::get(ALERT_RULES_PATH), &[200], None)
            .await?;
        response.json()
    }

    /// Alert rules linked to the given dashboard through their annotations
    pub async fn list_alerts_for_dashboard(
        &self,
        cancel: &CancellationToken,
        dashboard_uid: &str,
    ) -> Result<Vec<AlertRef>, ClientError> {
        let rules = self.list_alerts(cancel).await?;

        Ok(rules
            .into_iter()
            .filter(|rule| rule.dashboard_uid() == Some(dashboard_uid))
            .map(AlertRef::from)
            .collect())
    }

    /// Fetch an alert rule by UID
    pub async fn get_alert(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<ProvisionedRule, ClientError> {
        let request = ApiRequest::get(format!("{}/{}", ALERT_RULES_PATH, escape(uid)));
        let response = self
            .call(cancel, request, &[200], Some(ClientError::AlertNotFound))
            .await?;
        response.json()
    }

    /// Create the rule, or update it in place when it carries a UID.
    /// Datasource names are resolved against `datasources` first.
    pub async fn upsert_alert(
        &self,
        cancel: &CancellationToken,
        mut rule: AlertRule,
        datasources: &HashMap<String, String>,
    ) -> Result<(), ClientError> {
        rule.resolve_datasources(datasources)?;

        let request = if rule.uid().is_empty() {
            ApiRequest::json(Method::Post, ALERT_RULES_PATH, &rule)?
        } else {
            let path = format!("{}/{}", ALERT_RULES_PATH, escape(rule.uid()));
            ApiRequest::json(Method::Put, path, &rule)?
        };
        let method = request.method;

        self.call(cancel, request, &[200, 201], None).await?;

        tracing::info!(
            alert_title = %rule.title(),
            uid = %rule.uid(),
            method = %method,
            "Alert rule provisioned"
        );
        Ok(())
    }

    /// Delete an alert rule by UID
    pub async fn delete_alert(&self, cancel: &CancellationToken, uid: &str) -> Result<(), ClientError> {
        let request = ApiRequest::delete(format!("{}/{}", ALERT_RULES_PATH, escape(uid)));
        self.call(cancel, request, &[204], Some(ClientError::AlertNotFound))
            .await?;

        tracing::info!(uid = %uid, "Alert rule deleted");
        Ok(())
    }

    /// Replace the configuration of Grafana's built-in alert manager
    /// (contact points, notification policies, templates).
    /// Only a 202 counts as applied.
    pub async fn configure_alert_manager<C: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        config: &C,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::json(Method::Post, ALERT_MANAGER_CONFIG_PATH, config)?;
        self.call(cancel, request, &[202], None).await?;

        tracing::info!("Alert manager configured");
        Ok(())
    }

    /// Delete the dashboard document only, leaving its alerts alone
    pub(crate) async fn delete_dashboard_document(
        &self,
        cancel: &CancellationToken,
        uid: &str,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::delete(format!("/api/dashboards/uid/{}", escape(uid)));
        self.call(cancel, request, &[200], Some(ClientError::DashboardNotFound))
            .await?;

        tracing::info!(uid = %uid, "Dashboard deleted");
        Ok(())
    }
}
