//! Unified alerting rules
//!
//! Alert rules are built from plain configuration structs through validating
//! constructors, then serialized into the provisioning API's wire format.
//! Query nodes are datasource queries, Azure Monitor metric queries or
//! server-side expressions;
//! expressions are flattened into a single object keyed by a `type` field.

pub mod azure;
pub mod error;
pub mod expr;
pub mod model;
pub mod query;
pub mod rule;

pub use azure::{
    AzureAggregation, AzureMonitorBody, AzureMonitorTarget, AzureQueryConfig, AzureResource,
};
pub use error::BuildError;
pub use expr::{
    ClassicCondition, ClassicEvalType, ClassicOperator, ClassicReducer, Command, DownSampler,
    ExpressionConfig, ReduceMode, ReduceSettings, ReducerFunc, ThresholdCondition,
    ThresholdEvalType, UpSampler,
};
pub use model::{QueryModel, QueryNode, RelativeTimeRange};
pub use query::{EvaluationMode, QueryConfig};
pub use rule::{AlertConfig, AlertRule, ExecErrorState, NoDataState};

/// Datasource marker used by server-side expressions
pub const EXPR_DATASOURCE_UID: &str = "__expr__";

/// Annotation linking a rule to the dashboard holding its panel
pub const DASHBOARD_UID_ANNOTATION: &str = "__dashboardUid__";

/// Annotation linking a rule to the panel it was defined on
pub const PANEL_ID_ANNOTATION: &str = "__panelId__";

/// Annotation linking a rule to a dashboard when no panel is involved
pub const CUSTOM_DASHBOARD_REF_ANNOTATION: &str = "customDashboardRef";

/// Default query interval (1s)
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// 12 hours at a 1s interval
pub const DEFAULT_MAX_DATA_POINTS: u64 = 43200;
