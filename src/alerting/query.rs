//! Datasource queries used as alert rule inputs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use super::model::{QueryModel, QueryNode, RelativeTimeRange};
use super::{DEFAULT_INTERVAL_MS, DEFAULT_MAX_DATA_POINTS};

/// How the datasource evaluates a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Evaluate over the whole time range
    #[default]
    Range,
    /// Evaluate at a single point in time
    Instant,
}

/// Configuration of a datasource query node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Reference identifier, unique within an alert rule
    pub ref_id: String,
    /// Datasource name; resolved to a UID right before provisioning.
    /// Left empty, a panel alert inherits the datasource of its panel.
    pub datasource: String,
    /// Query in the datasource's language
    pub expr: Option<String>,
    /// Evaluated time window, relative to now
    pub time_range: RelativeTimeRange,
    pub legend: String,
    pub mode: EvaluationMode,
    /// Whether this node's result triggers the alert
    pub alert_condition: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            ref_id: String::new(),
            datasource: String::new(),
            expr: None,
            time_range: RelativeTimeRange { from: 600, to: 0 },
            legend: "__auto".to_string(),
            mode: EvaluationMode::Range,
            alert_condition: false,
        }
    }
}

impl QueryConfig {
    /// Create a query configuration with default settings
    pub fn new(ref_id: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            expr: Some(expr.into()),
            ..Self::default()
        }
    }

    /// Set the datasource name
    pub fn with_datasource(mut self, name: impl Into<String>) -> Self {
        self.datasource = name.into();
        self
    }

    /// Set the evaluated time window (offsets from now)
    pub fn with_time_range(mut self, from: Duration, to: Duration) -> Self {
        self.time_range = RelativeTimeRange {
            from: from.as_secs(),
            to: to.as_secs(),
        };
        self
    }

    /// Set the legend format
    pub fn with_legend(mut self, legend: impl Into<String>) -> Self {
        self.legend = legend.into();
        self
    }

    /// Evaluate as an instant query
    pub fn instant(mut self) -> Self {
        self.mode = EvaluationMode::Instant;
        self
    }

    /// Evaluate as a range query
    pub fn range(mut self) -> Self {
        self.mode = EvaluationMode::Range;
        self
    }

    /// Mark this query as the alert condition
    pub fn as_condition(mut self) -> Self {
        self.alert_condition = true;
        self
    }

    /// Validate the configuration and build the query node
    pub fn build(self) -> Result<QueryNode, BuildError> {
        if self.ref_id.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "query refId must not be empty".to_string(),
            ));
        }

        let expr = match self.expr {
            Some(expr) if !expr.trim().is_empty() => expr,
            _ => return Err(BuildError::MissingExpression(self.ref_id)),
        };

        let body = QueryBody {
            editor_mode: "code".to_string(),
            expr,
            instant: self.mode == EvaluationMode::Instant,
            interval_ms: DEFAULT_INTERVAL_MS,
            legend_format: self.legend,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            range: self.mode == EvaluationMode::Range,
            ref_id: self.ref_id.clone(),
        };

        Ok(QueryNode {
            ref_id: self.ref_id,
            query_type: String::new(),
            relative_time_range: self.time_range,
            datasource_uid: self.datasource,
            model: QueryModel::Query(body),
            condition: self.alert_condition,
        })
    }
}

/// Wire model of a datasource query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    pub editor_mode: String,
    pub expr: String,
    pub instant: bool,
    pub interval_ms: u64,
    pub legend_format: String,
    pub max_data_points: u64,
    pub range: bool,
    pub ref_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let node = QueryConfig::new("A", "rate(http_requests_total[5m])")
            .build()
            .unwrap();

        assert_eq!(node.ref_id, "A");
        assert_eq!(node.relative_time_range, RelativeTimeRange { from: 600, to: 0 });
        assert!(!node.condition);

        match node.model {
            QueryModel::Query(body) => {
                assert!(body.range);
                assert!(!body.instant);
                assert_eq!(body.legend_format, "__auto");
                assert_eq!(body.editor_mode, "code");
                assert_eq!(body.max_data_points, DEFAULT_MAX_DATA_POINTS);
            }
            other => panic!("expected a query model, got {:?}", other),
        }
    }

    #[test]
    fn test_instant_and_range_are_exclusive() {
        let node = QueryConfig::new("A", "up").instant().build().unwrap();
        let QueryModel::Query(body) = node.model else {
            panic!("expected a query model");
        };
        assert!(body.instant);
        assert!(!body.range);

        let node = QueryConfig::new("A", "up").instant().range().build().unwrap();
        let QueryModel::Query(body) = node.model else {
            panic!("expected a query model");
        };
        assert!(!body.instant);
        assert!(body.range);
    }

    #[test]
    fn test_time_range_in_seconds() {
        let node = QueryConfig::new("A", "up")
            .with_time_range(Duration::from_secs(3600), Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(node.relative_time_range.from, 3600);
        assert_eq!(node.relative_time_range.to, 60);
    }

    #[test]
    fn test_missing_expression_is_rejected() {
        let config = QueryConfig {
            ref_id: "A".to_string(),
            ..QueryConfig::default()
        };
        assert!(matches!(config.build(), Err(BuildError::MissingExpression(r)) if r == "A"));

        let err = QueryConfig::new("A", "  ").build().unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_empty_ref_id_is_rejected() {
        let err = QueryConfig::new("", "up").build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }
}
