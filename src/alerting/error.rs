/// Errors raised while building or preparing alert rules
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No query or expression is marked as alert condition in alert '{0}'")]
    NoCondition(String),

    #[error("Alert '{title}' has several condition nodes: {ref_ids:?}")]
    MultipleConditions { title: String, ref_ids: Vec<String> },

    #[error("Expression {0} has no command")]
    MissingCommand(String),

    #[error("Query {0} has no expression")]
    MissingExpression(String),

    #[error("Azure Monitor query {0} has no subscription in its resources")]
    NoSubscription(String),

    #[error("Azure Monitor query {ref_id} spans several subscriptions: {subscriptions:?}")]
    MixedSubscriptions {
        ref_id: String,
        subscriptions: Vec<String>,
    },

    #[error("Duplicate refId {ref_id} in alert '{title}'")]
    DuplicateRefId { title: String, ref_id: String },

    #[error("Several alerts of dashboard '{dashboard}' are titled '{title}'")]
    DuplicateAlertTitle { dashboard: String, title: String },

    #[error("Could not infer datasource UID from its name: {0}")]
    UnresolvedDatasource(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BuildError {
    /// Whether this error stems from an invalid builder configuration
    /// (as opposed to a failed lookup at provisioning time).
    pub fn is_invalid_config(&self) -> bool {
        !matches!(
            self,
            BuildError::UnresolvedDatasource(_) | BuildError::Serialization(_)
        )
    }
}
