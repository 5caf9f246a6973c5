//! Server-side expressions (math, reduce, resample, threshold, classic conditions)

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use super::model::{QueryModel, QueryNode, RelativeTimeRange};
use super::{DEFAULT_INTERVAL_MS, DEFAULT_MAX_DATA_POINTS, EXPR_DATASOURCE_UID};

/// Expression command, tagged by its `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Arithmetic over other nodes, e.g. `$A / $B * 100`
    Math { expression: String },
    /// Reduce a time series to a single number
    Reduce {
        expression: String,
        reducer: ReducerFunc,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<ReduceSettings>,
    },
    /// Realign a time series on a fixed window
    Resample {
        expression: String,
        window: String,
        downsampler: DownSampler,
        upsampler: UpSampler,
    },
    /// Compare a number against thresholds
    Threshold {
        expression: String,
        conditions: Vec<ThresholdCondition>,
    },
    /// Legacy dashboard-alert style conditions
    ClassicConditions { conditions: Vec<ClassicCondition> },
}

impl Command {
    pub fn math(expression: impl Into<String>) -> Self {
        Command::Math {
            expression: expression.into(),
        }
    }

    pub fn reduce(ref_id: impl Into<String>, reducer: ReducerFunc) -> Self {
        Command::Reduce {
            expression: ref_id.into(),
            reducer,
            settings: None,
        }
    }

    /// Reduce with explicit handling of non-numeric values
    pub fn reduce_with(
        ref_id: impl Into<String>,
        reducer: ReducerFunc,
        settings: ReduceSettings,
    ) -> Self {
        Command::Reduce {
            expression: ref_id.into(),
            reducer,
            settings: Some(settings),
        }
    }

    pub fn resample(
        ref_id: impl Into<String>,
        window: impl Into<String>,
        downsampler: DownSampler,
        upsampler: UpSampler,
    ) -> Self {
        Command::Resample {
            expression: ref_id.into(),
            window: window.into(),
            downsampler,
            upsampler,
        }
    }

    pub fn threshold(ref_id: impl Into<String>, conditions: Vec<ThresholdCondition>) -> Self {
        Command::Threshold {
            expression: ref_id.into(),
            conditions,
        }
    }

    pub fn classic_conditions(conditions: Vec<ClassicCondition>) -> Self {
        Command::ClassicConditions { conditions }
    }

    /// Wire tag of this command
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Math { .. } => "math",
            Command::Reduce { .. } => "reduce",
            Command::Resample { .. } => "resample",
            Command::Threshold { .. } => "threshold",
            Command::ClassicConditions { .. } => "classic_conditions",
        }
    }

    fn validate(&self, ref_id: &str) -> Result<(), BuildError> {
        match self {
            Command::Math { expression }
            | Command::Reduce { expression, .. }
            | Command::Resample { expression, .. }
            | Command::Threshold { expression, .. }
                if expression.trim().is_empty() =>
            {
                Err(BuildError::InvalidConfig(format!(
                    "{} command of expression {} has an empty expression",
                    self.kind(),
                    ref_id
                )))
            }
            Command::Reduce {
                settings:
                    Some(ReduceSettings {
                        mode: ReduceMode::ReplaceNonNumeric,
                        replace_with_value: None,
                    }),
                ..
            } => Err(BuildError::InvalidConfig(format!(
                "reduce command of expression {} replaces non-numeric values without a replacement",
                ref_id
            ))),
            Command::Threshold { conditions, .. } if conditions.is_empty() => {
                Err(BuildError::InvalidConfig(format!(
                    "threshold command of expression {} has no condition",
                    ref_id
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducerFunc {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceSettings {
    pub mode: ReduceMode,
    /// Required when mode is `ReplaceNonNumeric`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_with_value: Option<f64>,
}

impl ReduceSettings {
    pub fn drop_non_numeric() -> Self {
        Self {
            mode: ReduceMode::DropNonNumeric,
            replace_with_value: None,
        }
    }

    pub fn replace_non_numeric(with: f64) -> Self {
        Self {
            mode: ReduceMode::ReplaceNonNumeric,
            replace_with_value: Some(with),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceMode {
    #[serde(rename = "")]
    Strict,
    #[serde(rename = "dropNN")]
    DropNonNumeric,
    #[serde(rename = "replaceNN")]
    ReplaceNonNumeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownSampler {
    Sum,
    Mean,
    Min,
    Max,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpSampler {
    Pad,
    BackFilling,
    FillNa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdEvalType {
    Gt,
    Lt,
    WithinRange,
    OutsideRange,
}

/// Threshold condition, `{"evaluator": {"params": [..], "type": ".."}}` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ThresholdConditionWire", from = "ThresholdConditionWire")]
pub struct ThresholdCondition {
    pub eval_type: ThresholdEvalType,
    pub params: Vec<f64>,
}

impl ThresholdCondition {
    pub fn gt(value: f64) -> Self {
        Self {
            eval_type: ThresholdEvalType::Gt,
            params: vec![value],
        }
    }

    pub fn lt(value: f64) -> Self {
        Self {
            eval_type: ThresholdEvalType::Lt,
            params: vec![value],
        }
    }

    pub fn within_range(from: f64, to: f64) -> Self {
        Self {
            eval_type: ThresholdEvalType::WithinRange,
            params: vec![from, to],
        }
    }

    pub fn outside_range(from: f64, to: f64) -> Self {
        Self {
            eval_type: ThresholdEvalType::OutsideRange,
            params: vec![from, to],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ThresholdConditionWire {
    evaluator: EvaluatorWire<ThresholdEvalType>,
}

#[derive(Serialize, Deserialize)]
struct EvaluatorWire<T> {
    params: Vec<f64>,
    #[serde(rename = "type")]
    kind: T,
}

impl From<ThresholdCondition> for ThresholdConditionWire {
    fn from(condition: ThresholdCondition) -> Self {
        Self {
            evaluator: EvaluatorWire {
                params: condition.params,
                kind: condition.eval_type,
            },
        }
    }
}

impl From<ThresholdConditionWire> for ThresholdCondition {
    fn from(wire: ThresholdConditionWire) -> Self {
        Self {
            eval_type: wire.evaluator.kind,
            params: wire.evaluator.params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicEvalType {
    Gt,
    Lt,
    WithinRange,
    OutsideRange,
    NoValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassicOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicReducer {
    Avg,
    Sum,
    Min,
    Max,
    Count,
    Last,
    Median,
    Diff,
    DiffAbs,
    PercentDiff,
    PercentDiffAbs,
    CountNonNull,
}

/// One classic condition: reduce the referenced series, then evaluate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ClassicConditionWire", from = "ClassicConditionWire")]
pub struct ClassicCondition {
    pub eval_type: ClassicEvalType,
    pub params: Vec<f64>,
    /// How this condition combines with the previous one
    pub operator: ClassicOperator,
    /// Nodes the condition applies to
    pub ref_ids: Vec<String>,
    pub reducer: ClassicReducer,
}

impl ClassicCondition {
    pub fn new(
        ref_id: impl Into<String>,
        reducer: ClassicReducer,
        eval_type: ClassicEvalType,
        params: Vec<f64>,
    ) -> Self {
        Self {
            eval_type,
            params,
            operator: ClassicOperator::And,
            ref_ids: vec![ref_id.into()],
            reducer,
        }
    }

    pub fn with_operator(mut self, operator: ClassicOperator) -> Self {
        self.operator = operator;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct ClassicConditionWire {
    evaluator: EvaluatorWire<ClassicEvalType>,
    operator: TypeWire<ClassicOperator>,
    query: QueryParamsWire,
    reducer: TypeWire<ClassicReducer>,
}

#[derive(Serialize, Deserialize)]
struct TypeWire<T> {
    #[serde(rename = "type")]
    kind: T,
}

#[derive(Serialize, Deserialize)]
struct QueryParamsWire {
    params: Vec<String>,
}

impl From<ClassicCondition> for ClassicConditionWire {
    fn from(condition: ClassicCondition) -> Self {
        Self {
            evaluator: EvaluatorWire {
                params: condition.params,
                kind: condition.eval_type,
            },
            operator: TypeWire {
                kind: condition.operator,
            },
            query: QueryParamsWire {
                params: condition.ref_ids,
            },
            reducer: TypeWire {
                kind: condition.reducer,
            },
        }
    }
}

impl From<ClassicConditionWire> for ClassicCondition {
    fn from(wire: ClassicConditionWire) -> Self {
        Self {
            eval_type: wire.evaluator.kind,
            params: wire.evaluator.params,
            operator: wire.operator.kind,
            ref_ids: wire.query.params,
            reducer: wire.reducer.kind,
        }
    }
}

/// Configuration of an expression node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Reference identifier, unique within an alert rule
    pub ref_id: String,
    pub command: Option<Command>,
    /// Whether this node's result triggers the alert
    pub alert_condition: bool,
    pub hide: bool,
}

impl ExpressionConfig {
    pub fn new(ref_id: impl Into<String>, command: Command) -> Self {
        Self {
            ref_id: ref_id.into(),
            command: Some(command),
            ..Self::default()
        }
    }

    /// Mark this expression as the alert condition
    pub fn as_condition(mut self) -> Self {
        self.alert_condition = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    /// Validate the configuration and build the expression node
    pub fn build(self) -> Result<QueryNode, BuildError> {
        if self.ref_id.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "expression refId must not be empty".to_string(),
            ));
        }

        let command = self
            .command
            .ok_or_else(|| BuildError::MissingCommand(self.ref_id.clone()))?;
        command.validate(&self.ref_id)?;

        let body = ExpressionBody {
            params: ExpressionParams {
                datasource: ExpressionDatasource::default(),
                hide: self.hide,
                interval_ms: DEFAULT_INTERVAL_MS,
                max_data_points: DEFAULT_MAX_DATA_POINTS,
                ref_id: self.ref_id.clone(),
            },
            command,
        };

        Ok(QueryNode {
            ref_id: self.ref_id,
            query_type: String::new(),
            relative_time_range: RelativeTimeRange::default(),
            datasource_uid: EXPR_DATASOURCE_UID.to_string(),
            model: QueryModel::Expression(body),
            condition: self.alert_condition,
        })
    }
}

/// Expression model: fixed parameters plus the active command
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionBody {
    pub params: ExpressionParams,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionParams {
    pub datasource: ExpressionDatasource,
    pub hide: bool,
    pub interval_ms: u64,
    pub max_data_points: u64,
    pub ref_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionDatasource {
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
}

impl Default for ExpressionDatasource {
    fn default() -> Self {
        Self {
            kind: EXPR_DATASOURCE_UID.to_string(),
            uid: EXPR_DATASOURCE_UID.to_string(),
        }
    }
}
