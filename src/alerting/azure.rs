//! Azure Monitor metric queries used as alert rule inputs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use super::model::{QueryModel, QueryNode, RelativeTimeRange};

/// Query type understood by the Azure Monitor datasource
pub const AZURE_MONITOR_QUERY_TYPE: &str = "Azure Monitor";

/// Aggregation applied to a metric over each time grain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AzureAggregation {
    #[default]
    Average,
    Minimum,
    Maximum,
}

/// Azure resource a metric is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureResource {
    pub metric_namespace: String,
    pub region: String,
    pub resource_group: String,
    pub resource_name: String,
    pub subscription: String,
}

/// Metric selection sent as the node's `azureMonitor` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureMonitorTarget {
    pub aggregation: AzureAggregation,
    pub metric_name: String,
    pub metric_namespace: String,
    pub region: String,
    #[serde(default)]
    pub resources: Vec<AzureResource>,
    #[serde(default = "auto_time_grain")]
    pub time_grain: String,
}

fn auto_time_grain() -> String {
    "auto".to_string()
}

impl AzureMonitorTarget {
    pub fn new(
        aggregation: AzureAggregation,
        metric_namespace: impl Into<String>,
        metric_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            aggregation,
            metric_name: metric_name.into(),
            metric_namespace: metric_namespace.into(),
            region: region.into(),
            resources: Vec::new(),
            time_grain: auto_time_grain(),
        }
    }

    /// Add a resource. Its namespace and region are copied from the target.
    pub fn with_resource(
        mut self,
        subscription: impl Into<String>,
        resource_group: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        self.resources.push(AzureResource {
            metric_namespace: self.metric_namespace.clone(),
            region: self.region.clone(),
            resource_group: resource_group.into(),
            resource_name: resource_name.into(),
            subscription: subscription.into(),
        });
        self
    }

    /// Set the time grain, e.g. `PT5M`
    pub fn with_time_grain(mut self, time_grain: impl Into<String>) -> Self {
        self.time_grain = time_grain.into();
        self
    }
}

/// Configuration of an Azure Monitor query node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureQueryConfig {
    pub ref_id: String,
    /// Datasource name; inherited from the panel when empty
    #[serde(default)]
    pub datasource: String,
    pub target: AzureMonitorTarget,
    #[serde(default = "default_time_range")]
    pub time_range: RelativeTimeRange,
    #[serde(default)]
    pub alert_condition: bool,
}

fn default_time_range() -> RelativeTimeRange {
    RelativeTimeRange { from: 3600, to: 0 }
}

impl AzureQueryConfig {
    pub fn new(ref_id: impl Into<String>, target: AzureMonitorTarget) -> Self {
        Self {
            ref_id: ref_id.into(),
            datasource: String::new(),
            target,
            time_range: default_time_range(),
            alert_condition: false,
        }
    }

    pub fn with_datasource(mut self, name: impl Into<String>) -> Self {
        self.datasource = name.into();
        self
    }

    pub fn with_time_range(mut self, from: Duration, to: Duration) -> Self {
        self.time_range = RelativeTimeRange {
            from: from.as_secs(),
            to: to.as_secs(),
        };
        self
    }

    pub fn as_condition(mut self) -> Self {
        self.alert_condition = true;
        self
    }

    /// Validate the configuration and build the query node.
    ///
    /// All resources must belong to one subscription, which is repeated at
    /// the top of the model.
    pub fn build(self) -> Result<QueryNode, BuildError> {
        if self.ref_id.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "query refId must not be empty".to_string(),
            ));
        }

        let mut subscriptions: Vec<String> = Vec::new();
        for resource in &self.target.resources {
            if !subscriptions.contains(&resource.subscription) {
                subscriptions.push(resource.subscription.clone());
            }
        }

        let subscription = match subscriptions.len() {
            1 => subscriptions.remove(0),
            0 => return Err(BuildError::NoSubscription(self.ref_id)),
            _ => {
                return Err(BuildError::MixedSubscriptions {
                    ref_id: self.ref_id,
                    subscriptions,
                })
            }
        };
        if subscription.trim().is_empty() {
            return Err(BuildError::NoSubscription(self.ref_id));
        }

        let body = AzureMonitorBody {
            ref_id: self.ref_id.clone(),
            azure_monitor: self.target,
            query_type: AZURE_MONITOR_QUERY_TYPE.to_string(),
            subscription,
        };

        Ok(QueryNode {
            ref_id: self.ref_id,
            query_type: AZURE_MONITOR_QUERY_TYPE.to_string(),
            relative_time_range: self.time_range,
            datasource_uid: self.datasource,
            model: QueryModel::AzureMonitor(body),
            condition: self.alert_condition,
        })
    }
}

/// Wire model of an Azure Monitor query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureMonitorBody {
    pub ref_id: String,
    pub azure_monitor: AzureMonitorTarget,
    pub query_type: String,
    pub subscription: String,
}
