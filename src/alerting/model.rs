//! Query nodes and their flattened wire model

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};

use super::azure::AzureMonitorBody;
use super::error::BuildError;
use super::expr::{ExpressionBody, ExpressionConfig};
use super::query::{QueryBody, QueryConfig};
use super::EXPR_DATASOURCE_UID;

/// Time window relative to now, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeTimeRange {
    pub from: u64,
    pub to: u64,
}

/// One entry of an alert rule's `data` sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNode {
    pub ref_id: String,
    pub query_type: String,
    pub relative_time_range: RelativeTimeRange,
    /// Datasource UID, `__expr__` for expressions. Holds the datasource
    /// name until the rule is resolved against the server.
    pub datasource_uid: String,
    pub model: QueryModel,
    #[serde(skip)]
    pub(crate) condition: bool,
}

impl QueryNode {
    /// Build a datasource query node
    pub fn query(config: QueryConfig) -> Result<Self, BuildError> {
        config.build()
    }

    /// Build an expression node
    pub fn expression(config: ExpressionConfig) -> Result<Self, BuildError> {
        config.build()
    }

    /// Whether this node was marked as the alert condition
    pub fn is_condition(&self) -> bool {
        self.condition
    }

    /// Whether this node is evaluated server-side rather than by a datasource
    pub fn is_expression(&self) -> bool {
        matches!(self.model, QueryModel::Expression(_))
    }

    /// Replace the datasource name with its UID. Expressions are left as is.
    pub(crate) fn resolve_datasource(
        &mut self,
        datasources: &std::collections::HashMap<String, String>,
    ) -> Result<(), BuildError> {
        if self.datasource_uid == EXPR_DATASOURCE_UID {
            return Ok(());
        }

        let uid = datasources
            .get(&self.datasource_uid)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| BuildError::UnresolvedDatasource(self.datasource_uid.clone()))?;
        self.datasource_uid = uid.clone();
        Ok(())
    }
}

/// Polymorphic model of a query node
#[derive(Debug, Clone, PartialEq)]
pub enum QueryModel {
    Query(QueryBody),
    AzureMonitor(AzureMonitorBody),
    Expression(ExpressionBody),
}

impl Serialize for QueryModel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            QueryModel::Query(body) => body.serialize(serializer),
            QueryModel::AzureMonitor(body) => body.serialize(serializer),
            QueryModel::Expression(body) => body
                .to_json()
                .map_err(S::Error::custom)?
                .serialize(serializer),
        }
    }
}

impl ExpressionBody {
    /// Merge the fixed parameters with the command's fields and `type` tag
    /// into a single object. Command fields win on key collisions.
    pub fn to_json(&self) -> Result<serde_json::Value, BuildError> {
        let mut data = into_object(serde_json::to_value(&self.params))?;
        let command = into_object(serde_json::to_value(&self.command))?;

        data.extend(command);
        Ok(serde_json::Value::Object(data))
    }
}

fn into_object(
    value: Result<serde_json::Value, serde_json::Error>,
) -> Result<serde_json::Map<String, serde_json::Value>, BuildError> {
    match value {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(BuildError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(BuildError::Serialization(e.to_string())),
    }
}
