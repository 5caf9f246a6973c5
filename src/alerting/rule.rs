//! Alert rule definition

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::azure::AzureQueryConfig;
use super::error::BuildError;
use super::expr::ExpressionConfig;
use super::model::QueryNode;
use super::query::QueryConfig;
use super::{CUSTOM_DASHBOARD_REF_ANNOTATION, DASHBOARD_UID_ANNOTATION, PANEL_ID_ANNOTATION};

/// Rule state when the queries return no data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoDataState {
    Alerting,
    #[default]
    NoData,
    #[serde(rename = "OK")]
    Ok,
}

/// Rule state when evaluation fails or times out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecErrorState {
    #[default]
    Alerting,
    Error,
    #[serde(rename = "OK")]
    Ok,
}

/// A node of the rule's evaluation pipeline, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeConfig {
    Query(QueryConfig),
    AzureMonitor(AzureQueryConfig),
    Expression(ExpressionConfig),
}

impl NodeConfig {
    fn build(self) -> Result<QueryNode, BuildError> {
        match self {
            NodeConfig::Query(config) => config.build(),
            NodeConfig::AzureMonitor(config) => config.build(),
            NodeConfig::Expression(config) => config.build(),
        }
    }
}

/// Alert rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// How long the condition must hold before firing, e.g. `5m`
    pub for_duration: String,
    pub no_data_state: NoDataState,
    pub exec_error_state: ExecErrorState,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub runbook_url: Option<String>,
    pub annotations: BTreeMap<String, String>,
    /// Forwarded to notification channels and used for routing
    pub labels: BTreeMap<String, String>,
    pub data: Vec<NodeConfig>,
    /// Overridden when the rule is provisioned along with a dashboard
    pub folder_uid: Option<String>,
    /// Overridden when the rule is provisioned along with a dashboard
    pub rule_group: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            for_duration: "5m".to_string(),
            no_data_state: NoDataState::NoData,
            exec_error_state: ExecErrorState::Alerting,
            summary: None,
            description: None,
            runbook_url: None,
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
            data: Vec::new(),
            folder_uid: None,
            rule_group: None,
        }
    }
}

impl AlertConfig {
    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.data.push(NodeConfig::Query(query));
        self
    }

    pub fn with_azure_query(mut self, query: AzureQueryConfig) -> Self {
        self.data.push(NodeConfig::AzureMonitor(query));
        self
    }

    pub fn with_expression(mut self, expression: ExpressionConfig) -> Self {
        self.data.push(NodeConfig::Expression(expression));
        self
    }

    pub fn with_for(mut self, duration: impl Into<String>) -> Self {
        self.for_duration = duration.into();
        self
    }

    pub fn on_no_data(mut self, state: NoDataState) -> Self {
        self.no_data_state = state;
        self
    }

    pub fn on_execution_error(mut self, state: ExecErrorState) -> Self {
        self.exec_error_state = state;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_runbook(mut self, url: impl Into<String>) -> Self {
        self.runbook_url = Some(url.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A provisionable unified alerting rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    #[serde(skip_serializing_if = "String::is_empty")]
    uid: String,
    #[serde(rename = "folderUID")]
    folder_uid: String,
    rule_group: String,
    title: String,
    condition: String,
    data: Vec<QueryNode>,
    no_data_state: NoDataState,
    #[serde(rename = "execErrState")]
    exec_error_state: ExecErrorState,
    #[serde(rename = "for")]
    for_duration: String,
    annotations: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    is_paused: bool,
}

impl AlertRule {
    /// Build a rule, checking that its nodes are valid, uniquely identified,
    /// and that exactly one of them is the alert condition.
    pub fn new(title: impl Into<String>, config: AlertConfig) -> Result<Self, BuildError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "alert title must not be empty".to_string(),
            ));
        }

        let data = config
            .data
            .into_iter()
            .map(NodeConfig::build)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        for node in &data {
            if !seen.insert(node.ref_id.as_str()) {
                return Err(BuildError::DuplicateRefId {
                    title,
                    ref_id: node.ref_id.clone(),
                });
            }
        }

        let conditions: Vec<&str> = data
            .iter()
            .filter(|node| node.condition)
            .map(|node| node.ref_id.as_str())
            .collect();
        let condition = match conditions.as_slice() {
            [] => return Err(BuildError::NoCondition(title)),
            [ref_id] => ref_id.to_string(),
            many => {
                return Err(BuildError::MultipleConditions {
                    ref_ids: many.iter().map(|r| r.to_string()).collect(),
                    title,
                })
            }
        };

        let mut annotations = config.annotations;
        for (key, value) in [
            ("summary", config.summary),
            ("description", config.description),
            ("runbook_url", config.runbook_url),
        ] {
            if let Some(value) = value {
                annotations.insert(key.to_string(), value);
            }
        }

        Ok(Self {
            uid: String::new(),
            folder_uid: config.folder_uid.unwrap_or_default(),
            rule_group: config.rule_group.unwrap_or_default(),
            title,
            condition,
            data,
            no_data_state: config.no_data_state,
            exec_error_state: config.exec_error_state,
            for_duration: config.for_duration,
            annotations,
            labels: config.labels,
            is_paused: false,
        })
    }

    /// Server-assigned identifier, empty until created
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn folder_uid(&self) -> &str {
        &self.folder_uid
    }

    pub fn rule_group(&self) -> &str {
        &self.rule_group
    }

    /// Reference identifier of the node evaluated as the trigger
    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn data(&self) -> &[QueryNode] {
        &self.data
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn no_data_state(&self) -> NoDataState {
        self.no_data_state
    }

    pub fn exec_error_state(&self) -> ExecErrorState {
        self.exec_error_state
    }

    pub fn for_duration(&self) -> &str {
        &self.for_duration
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.insert(key.into(), value.into());
    }

    pub(crate) fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = uid.into();
    }

    pub(crate) fn place(&mut self, folder_uid: impl Into<String>, rule_group: impl Into<String>) {
        self.folder_uid = folder_uid.into();
        self.rule_group = rule_group.into();
    }

    pub(crate) fn hook_dashboard_uid(&mut self, uid: &str) {
        self.annotate(DASHBOARD_UID_ANNOTATION, uid);
    }

    pub(crate) fn hook_panel_id(&mut self, id: &str) {
        self.annotate(PANEL_ID_ANNOTATION, id);
    }

    pub(crate) fn hook_custom_dashboard_ref(&mut self, uid: &str) {
        self.annotate(CUSTOM_DASHBOARD_REF_ANNOTATION, uid);
    }

    /// Give queries without a datasource the given one
    pub(crate) fn inherit_datasource(&mut self, name: &str) {
        for node in &mut self.data {
            if !node.is_expression() && node.datasource_uid.is_empty() {
                node.datasource_uid = name.to_string();
            }
        }
    }

    /// Replace every query's datasource name by its UID
    pub fn resolve_datasources(
        &mut self,
        datasources: &HashMap<String, String>,
    ) -> Result<(), BuildError> {
        for node in &mut self.data {
            node.resolve_datasource(datasources)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::expr::{Command, ReducerFunc, ThresholdCondition};

    fn cpu_config() -> AlertConfig {
        AlertConfig::default()
            .with_query(QueryConfig::new("A", "avg(cpu_usage)").with_datasource("Prometheus"))
            .with_expression(ExpressionConfig::new(
                "B",
                Command::reduce("A", ReducerFunc::Last),
            ))
            .with_expression(
                ExpressionConfig::new(
                    "C",
                    Command::threshold("B", vec![ThresholdCondition::gt(80.0)]),
                )
                .as_condition(),
            )
    }

    #[test]
    fn test_alert_defaults() {
        let rule = AlertRule::new("High CPU", cpu_config()).unwrap();

        assert_eq!(rule.title(), "High CPU");
        assert_eq!(rule.condition(), "C");
        assert_eq!(rule.for_duration(), "5m");
        assert_eq!(rule.no_data_state(), NoDataState::NoData);
        assert_eq!(rule.exec_error_state(), ExecErrorState::Alerting);
        assert_eq!(rule.uid(), "");
        assert_eq!(rule.data().len(), 3);
    }

    #[test]
    fn test_overrides_apply_after_defaults() {
        let config = cpu_config()
            .with_for("1m")
            .on_no_data(NoDataState::Ok)
            .on_execution_error(ExecErrorState::Error)
            .with_summary("CPU is high")
            .with_runbook("https://runbooks/cpu")
            .with_label("severity", "page");
        let rule = AlertRule::new("High CPU", config).unwrap();

        assert_eq!(rule.for_duration(), "1m");
        assert_eq!(rule.no_data_state(), NoDataState::Ok);
        assert_eq!(rule.exec_error_state(), ExecErrorState::Error);
        assert_eq!(rule.annotations()["summary"], "CPU is high");
        assert_eq!(rule.annotations()["runbook_url"], "https://runbooks/cpu");
        assert_eq!(rule.labels()["severity"], "page");
    }

    #[test]
    fn test_no_condition_is_rejected() {
        let config = AlertConfig::default().with_query(QueryConfig::new("A", "up"));
        let err = AlertRule::new("Down", config).unwrap_err();
        assert!(matches!(err, BuildError::NoCondition(ref title) if title == "Down"));

        let err = AlertRule::new("Empty", AlertConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::NoCondition(_)));
    }

    #[test]
    fn test_several_conditions_are_rejected() {
        let config = AlertConfig::default()
            .with_query(QueryConfig::new("A", "up").as_condition())
            .with_expression(ExpressionConfig::new("B", Command::math("$A")).as_condition());

        let err = AlertRule::new("Ambiguous", config).unwrap_err();
        match err {
            BuildError::MultipleConditions { ref_ids, .. } => assert_eq!(ref_ids, vec!["A", "B"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ref_ids_are_rejected() {
        let config = AlertConfig::default()
            .with_query(QueryConfig::new("A", "up"))
            .with_expression(ExpressionConfig::new("A", Command::math("$A")).as_condition());

        let err = AlertRule::new("Duplicated", config).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateRefId { ref ref_id, .. } if ref_id == "A"));
    }

    #[test]
    fn test_invalid_node_fails_the_rule() {
        let config = AlertConfig::default().with_expression(ExpressionConfig {
            ref_id: "B".to_string(),
            alert_condition: true,
            ..ExpressionConfig::default()
        });

        let err = AlertRule::new("Broken", config).unwrap_err();
        assert!(matches!(err, BuildError::MissingCommand(_)));
    }

    #[test]
    fn test_rule_wire_shape() {
        let mut rule = AlertRule::new("High CPU", cpu_config()).unwrap();
        rule.place("folder-uid", "Service dashboard");

        let value = serde_json::to_value(&rule).unwrap();
        assert!(value.get("uid").is_none());
        assert_eq!(value["folderUID"], "folder-uid");
        assert_eq!(value["ruleGroup"], "Service dashboard");
        assert_eq!(value["condition"], "C");
        assert_eq!(value["noDataState"], "NoData");
        assert_eq!(value["execErrState"], "Alerting");
        assert_eq!(value["for"], "5m");
        assert_eq!(value["isPaused"], false);
        assert_eq!(value["data"].as_array().unwrap().len(), 3);
        assert_eq!(value["data"][2]["model"]["type"], "threshold");

        rule.set_uid("abc");
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["uid"], "abc");
    }

    #[test]
    fn test_inherit_datasource_only_fills_empty_queries() {
        let config = AlertConfig::default()
            .with_query(QueryConfig::new("A", "up"))
            .with_query(QueryConfig::new("B", "up").with_datasource("Loki"))
            .with_expression(ExpressionConfig::new("C", Command::math("$A + $B")).as_condition());
        let mut rule = AlertRule::new("Inherit", config).unwrap();

        rule.inherit_datasource("Prometheus");

        let datasources: Vec<&str> = rule.data().iter().map(|n| n.datasource_uid.as_str()).collect();
        assert_eq!(datasources, vec!["Prometheus", "Loki", "__expr__"]);
    }

    #[test]
    fn test_azure_query_in_rule() {
        use crate::alerting::azure::{AzureAggregation, AzureMonitorTarget};

        let config: AlertConfig = serde_json::from_value(serde_json::json!({
            "data": [
                {"azure_monitor": {
                    "ref_id": "A",
                    "target": {
                        "aggregation": "Average",
                        "metricName": "Percentage CPU",
                        "metricNamespace": "Microsoft.Compute/virtualMachines",
                        "region": "westeurope",
                        "resources": [{
                            "metricNamespace": "Microsoft.Compute/virtualMachines",
                            "region": "westeurope",
                            "resourceGroup": "prod",
                            "resourceName": "vm-1",
                            "subscription": "sub-1"
                        }]
                    }
                }},
                {"expression": {"ref_id": "B", "command": {"type": "math", "expression": "$A > 80"}, "alert_condition": true}}
            ]
        }))
        .unwrap();
        let mut rule = AlertRule::new("VM CPU", config).unwrap();
        rule.inherit_datasource("Azure");

        assert_eq!(rule.data()[0].query_type, "Azure Monitor");
        assert_eq!(rule.data()[0].datasource_uid, "Azure");
        assert_eq!(rule.data()[1].datasource_uid, "__expr__");

        let config = AlertConfig::default()
            .with_azure_query(AzureQueryConfig::new(
                "A",
                AzureMonitorTarget::new(AzureAggregation::Average, "ns", "metric", "westeurope"),
            ))
            .with_expression(ExpressionConfig::new("B", Command::math("$A")).as_condition());
        let err = AlertRule::new("VM CPU", config).unwrap_err();
        assert!(matches!(err, BuildError::NoSubscription(r) if r == "A"));
    }

    #[test]
    fn test_resolve_datasources_stops_on_unknown_name() {
        let mut rule = AlertRule::new("High CPU", cpu_config()).unwrap();
        let err = rule.resolve_datasources(&HashMap::new()).unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedDatasource(name) if name == "Prometheus"));

        let datasources = HashMap::from([("Prometheus".to_string(), "P1".to_string())]);
        rule.resolve_datasources(&datasources).unwrap();
        assert_eq!(rule.data()[0].datasource_uid, "P1");
    }

    #[test]
    fn test_config_from_manifest_json() {
        let config: AlertConfig = serde_json::from_value(serde_json::json!({
            "for_duration": "10m",
            "labels": {"team": "infra"},
            "data": [
                {"query": {"ref_id": "A", "expr": "up", "datasource": "Prometheus"}},
                {"expression": {
                    "ref_id": "B",
                    "alert_condition": true,
                    "command": {"type": "math", "expression": "$A < 1"}
                }}
            ]
        }))
        .unwrap();

        let rule = AlertRule::new("Instance down", config).unwrap();
        assert_eq!(rule.for_duration(), "10m");
        assert_eq!(rule.condition(), "B");
        assert_eq!(rule.no_data_state(), NoDataState::NoData);
        assert_eq!(rule.labels()["team"], "infra");
    }
}
