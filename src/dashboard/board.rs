//! Dashboard JSON model
//!
//! Only the fields this crate reads or writes are typed; everything else
//! Grafana returns is kept verbatim so a fetched board can be sent back.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A dashboard document as stored by Grafana
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
    /// Auto-refresh interval. Grafana stores `false` when disabled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "refresh_interval"
    )]
    pub refresh: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub panels: Vec<Panel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_true")]
    pub show_title: bool,
    #[serde(default)]
    pub collapse: bool,
    #[serde(default)]
    pub panels: Vec<Panel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub panel_type: String,
    /// Either a legacy datasource name or a `{type, uid}` reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

fn refresh_interval<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Refresh {
        Interval(String),
        Toggle(bool),
    }

    Ok(match Option::<Refresh>::deserialize(deserializer)? {
        Some(Refresh::Interval(interval)) if !interval.is_empty() => Some(interval),
        Some(Refresh::Interval(_)) | Some(Refresh::Toggle(_)) | None => None,
    })
}

impl Board {
    /// ID of the first panel with the given title, rows first, then
    /// top-level panels. Empty when no panel matches.
    pub fn panel_id_by_title(&self, title: &str) -> String {
        self.rows
            .iter()
            .flat_map(|row| row.panels.iter())
            .chain(self.panels.iter())
            .find(|panel| panel.title == title)
            .map(|panel| panel.id.to_string())
            .unwrap_or_default()
    }
}
