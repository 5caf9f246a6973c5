//! Dashboard builder

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::board::{Board, Panel, Row, TimeWindow};
use crate::alerting::{AlertConfig, AlertRule, BuildError};

/// Dashboard-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Stable identifier; Grafana generates one when absent
    pub uid: Option<String>,
    pub tags: Vec<String>,
    pub editable: bool,
    pub time_from: String,
    pub time_to: String,
    /// Auto-refresh interval, e.g. `30s`
    pub refresh: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            uid: None,
            tags: Vec::new(),
            editable: true,
            time_from: "now-3h".to_string(),
            time_to: "now".to_string(),
            refresh: None,
        }
    }
}

/// Named alert definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub title: String,
    #[serde(flatten)]
    pub config: AlertConfig,
}

impl AlertDefinition {
    pub fn new(title: impl Into<String>, config: AlertConfig) -> Self {
        Self {
            title: title.into(),
            config,
        }
    }
}

/// Panel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub title: String,
    pub panel_type: String,
    /// Datasource name, inherited by alert queries without one
    pub datasource: Option<String>,
    /// Width in grid units, 1 to 12
    pub span: f32,
    pub height: Option<String>,
    pub description: Option<String>,
    pub alerts: Vec<AlertDefinition>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            panel_type: "timeseries".to_string(),
            datasource: None,
            span: 6.0,
            height: None,
            description: None,
            alerts: Vec::new(),
        }
    }
}

impl PanelConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, panel_type: impl Into<String>) -> Self {
        self.panel_type = panel_type.into();
        self
    }

    pub fn with_datasource(mut self, name: impl Into<String>) -> Self {
        self.datasource = Some(name.into());
        self
    }

    pub fn with_span(mut self, span: f32) -> Self {
        self.span = span;
        self
    }

    pub fn with_height(mut self, height: impl Into<String>) -> Self {
        self.height = Some(height.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an alert rule evaluated for this panel
    pub fn with_alert(mut self, title: impl Into<String>, config: AlertConfig) -> Self {
        self.alerts.push(AlertDefinition::new(title, config));
        self
    }
}

/// Row settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RowConfig {
    pub title: String,
    pub show_title: bool,
    pub collapse: bool,
    pub panels: Vec<PanelConfig>,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            show_title: true,
            collapse: false,
            panels: Vec::new(),
        }
    }
}

impl RowConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn hide_title(mut self) -> Self {
        self.show_title = false;
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.collapse = true;
        self
    }

    pub fn with_panel(mut self, panel: PanelConfig) -> Self {
        self.panels.push(panel);
        self
    }
}

/// An alert to provision along with a dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredAlert {
    pub rule: AlertRule,
    /// Title of the panel the alert is bound to, if any
    pub panel_title: Option<String>,
}

/// Builds a dashboard document and collects the alerts defined on it
#[derive(Debug, Clone)]
pub struct DashboardBuilder {
    board: Board,
    alerts: Vec<DesiredAlert>,
    next_panel_id: u64,
}

impl DashboardBuilder {
    pub fn new(title: impl Into<String>, config: DashboardConfig) -> Result<Self, BuildError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "dashboard title must not be empty".to_string(),
            ));
        }

        let board = Board {
            uid: config.uid.unwrap_or_default(),
            title,
            tags: config.tags,
            editable: config.editable,
            time: Some(TimeWindow {
                from: config.time_from,
                to: config.time_to,
            }),
            refresh: config.refresh,
            ..Board::default()
        };

        Ok(Self {
            board,
            alerts: Vec::new(),
            next_panel_id: 1,
        })
    }

    /// Add a row and its panels
    pub fn row(mut self, config: RowConfig) -> Result<Self, BuildError> {
        let mut panels = Vec::with_capacity(config.panels.len());
        for panel in config.panels {
            panels.push(self.add_panel(panel)?);
        }

        self.board.rows.push(Row {
            title: config.title,
            show_title: config.show_title,
            collapse: config.collapse,
            panels,
            ..Row::default()
        });
        Ok(self)
    }

    /// Add a top-level panel
    pub fn panel(mut self, config: PanelConfig) -> Result<Self, BuildError> {
        let panel = self.add_panel(config)?;
        self.board.panels.push(panel);
        Ok(self)
    }

    /// Add an alert that is not bound to any panel
    pub fn alert(mut self, title: impl Into<String>, config: AlertConfig) -> Result<Self, BuildError> {
        let rule = AlertRule::new(title, config)?;
        self.push_alert(rule, None)?;
        Ok(self)
    }

    /// Alerts share a rule group, where titles are matched case-insensitively
    fn push_alert(&mut self, rule: AlertRule, panel_title: Option<String>) -> Result<(), BuildError> {
        let title = rule.title().to_lowercase();
        if self
            .alerts
            .iter()
            .any(|alert| alert.rule.title().to_lowercase() == title)
        {
            return Err(BuildError::DuplicateAlertTitle {
                dashboard: self.board.title.clone(),
                title: rule.title().to_string(),
            });
        }

        self.alerts.push(DesiredAlert { rule, panel_title });
        Ok(())
    }

    fn add_panel(&mut self, config: PanelConfig) -> Result<Panel, BuildError> {
        if !(1.0..=12.0).contains(&config.span) {
            return Err(BuildError::InvalidConfig(format!(
                "span of panel '{}' must be between 1 and 12, got {}",
                config.title, config.span
            )));
        }

        for definition in config.alerts {
            let mut rule = AlertRule::new(definition.title, definition.config)?;
            if let Some(datasource) = &config.datasource {
                rule.inherit_datasource(datasource);
            }
            self.push_alert(rule, Some(config.title.clone()))?;
        }

        let id = self.next_panel_id;
        self.next_panel_id += 1;

        Ok(Panel {
            id,
            title: config.title,
            panel_type: config.panel_type,
            datasource: config.datasource.map(Value::String),
            span: Some(config.span),
            height: config.height,
            description: config.description,
            ..Panel::default()
        })
    }

    pub fn title(&self) -> &str {
        &self.board.title
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn alerts(&self) -> &[DesiredAlert] {
        &self.alerts
    }
}

/// Declarative description of a whole dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardDefinition {
    pub title: String,
    pub config: DashboardConfig,
    pub rows: Vec<RowConfig>,
    pub panels: Vec<PanelConfig>,
    pub alerts: Vec<AlertDefinition>,
}

impl DashboardDefinition {
    pub fn build(self) -> Result<DashboardBuilder, BuildError> {
        let mut builder = DashboardBuilder::new(self.title, self.config)?;
        for row in self.rows {
            builder = builder.row(row)?;
        }
        for panel in self.panels {
            builder = builder.panel(panel)?;
        }
        for alert in self.alerts {
            builder = builder.alert(alert.title, alert.config)?;
        }
        Ok(builder)
    }
}
