//! Dashboard object model and builder

pub mod board;
pub mod builder;

pub use board::{Board, Panel, Row, TimeWindow};
pub use builder::{
    AlertDefinition, DashboardBuilder, DashboardConfig, DashboardDefinition, DesiredAlert,
    PanelConfig, RowConfig,
};
