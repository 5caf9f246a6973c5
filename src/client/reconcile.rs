//! Dashboard provisioning with alert reconciliation
//!
//! Alert rules provisioned along with a dashboard live in the dashboard's
//! folder, in a rule group named after the dashboard. On every upsert the
//! rules currently linked to the dashboard are matched to the desired ones
//! by case-insensitive title: matches are updated in place (keeping their
//! UID), new titles are created, and leftovers are deleted. Rules linked to
//! the dashboard but moved to another folder or rule group are ignored.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use super::error::ClientError;
use super::grafana::{AlertRef, DashboardRef, Folder, GrafanaClient};
use super::transport::Transport;
use crate::alerting::AlertRule;
use crate::dashboard::{Board, DashboardBuilder, DesiredAlert};

/// Operations needed to bring a dashboard's alerts to the desired set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Rules to submit: created when their UID is empty, updated otherwise
    pub upserts: Vec<AlertRule>,
    /// Existing rules no longer desired
    pub deletions: Vec<AlertRef>,
}

/// Outcome of a dashboard upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub dashboard: DashboardRef,
    /// Titles of the created rules
    pub created: Vec<String>,
    /// UIDs of the rules updated in place
    pub updated: Vec<String>,
    /// UIDs of the deleted rules
    pub deleted: Vec<String>,
}

/// Decide which rules to create, update and delete.
///
/// `existing` are the rules linked to the dashboard, `board` the dashboard as
/// persisted by Grafana. Desired rules are stamped with the dashboard's
/// folder and rule group, linked to the dashboard (and to their panel when
/// bound to one), and inherit the UID of the existing rule with the same
/// title. When several existing rules share a title, the last one in server
/// order is matched. The earlier ones are shadowed: neither updated nor
/// deleted.
pub fn plan_reconciliation(
    existing: Vec<AlertRef>,
    desired: &[DesiredAlert],
    board: &Board,
    folder_uid: &str,
) -> ReconcilePlan {
    let mut candidates: Vec<Option<AlertRef>> = Vec::new();
    let mut by_title: HashMap<String, usize> = HashMap::new();

    for alert in existing {
        if alert.rule_group != board.title || alert.folder_uid != folder_uid {
            tracing::warn!(
                uid = %alert.uid,
                folder_uid = %alert.folder_uid,
                rule_group = %alert.rule_group,
                "Ignoring alert rule outside of the dashboard's folder and rule group"
            );
            continue;
        }

        let title = alert.title.to_lowercase();
        if let Some(shadowed) = by_title
            .insert(title, candidates.len())
            .and_then(|index| candidates[index].take())
        {
            tracing::warn!(
                uid = %shadowed.uid,
                title = %shadowed.title,
                kept = %alert.uid,
                "Duplicate alert rule title, leaving the earlier rule untouched"
            );
        }
        candidates.push(Some(alert));
    }

    let mut upserts = Vec::with_capacity(desired.len());
    for alert in desired {
        let mut rule = alert.rule.clone();

        match &alert.panel_title {
            Some(panel_title) => {
                rule.hook_dashboard_uid(&board.uid);
                rule.hook_panel_id(&board.panel_id_by_title(panel_title));
            }
            None => rule.hook_custom_dashboard_ref(&board.uid),
        }

        rule.place(folder_uid, board.title.as_str());

        let claimed = by_title
            .remove(&rule.title().to_lowercase())
            .and_then(|index| candidates[index].take());
        if let Some(existing) = claimed {
            rule.set_uid(existing.uid);
        }

        upserts.push(rule);
    }

    let deletions = candidates.into_iter().flatten().collect();

    ReconcilePlan { upserts, deletions }
}

impl<T: Transport> GrafanaClient<T> {
    /// Create or replace a dashboard in a folder, then reconcile its alerts.
    ///
    /// Steps run strictly in order and the first failure aborts the rest:
    /// the dashboard may then be persisted with its alerts partially
    /// reconciled. Running the upsert again converges.
    pub async fn upsert_dashboard(
        &self,
        cancel: &CancellationToken,
        folder: &Folder,
        builder: &DashboardBuilder,
    ) -> Result<ReconcileReport, ClientError> {
        let saved = self
            .persist_dashboard(cancel, folder, builder.board())
            .await?;

        // panel IDs and the UID only exist once persisted
        let mut board = self.get_dashboard_by_uid(cancel, &saved.uid).await?;
        if board.uid.is_empty() {
            board.uid = saved.uid.clone();
        }

        let existing = self
            .list_alerts_for_dashboard(cancel, &board.uid)
            .await
            .map_err(|e| e.context("could not prepare deletion of previous alerts for dashboard"))?;

        let plan = plan_reconciliation(existing, builder.alerts(), &board, &folder.uid);
        tracing::info!(
            dashboard = %board.title,
            upserts = plan.upserts.len(),
            deletions = plan.deletions.len(),
            "Reconciling dashboard alerts"
        );

        let datasources = self.datasources_uid_map(cancel).await?;

        let mut report = ReconcileReport {
            dashboard: saved,
            ..ReconcileReport::default()
        };

        for rule in plan.upserts {
            let title = rule.title().to_string();
            let uid = rule.uid().to_string();

            self.upsert_alert(cancel, rule, &datasources)
                .await
                .map_err(|e| e.context(format!("could not add new alert ({}) for dashboard", title)))?;

            if uid.is_empty() {
                report.created.push(title);
            } else {
                report.updated.push(uid);
            }
        }

        for stale in plan.deletions {
            self.delete_alert(cancel, &stale.uid)
                .await
                .map_err(|e| e.context(format!("could not delete alert {} for dashboard", stale.uid)))?;
            report.deleted.push(stale.uid);
        }

        Ok(report)
    }

    /// Delete every alert linked to a dashboard, then the dashboard itself.
    /// The dashboard is left in place if any alert deletion fails.
    pub async fn delete_dashboard(&self, cancel: &CancellationToken, uid: &str) -> Result<(), ClientError> {
        let alerts = self
            .list_alerts_for_dashboard(cancel, uid)
            .await
            .map_err(|e| e.context("could not prepare deletion of alerts for dashboard"))?;

        for alert in alerts {
            self.delete_alert(cancel, &alert.uid)
                .await
                .map_err(|e| e.context(format!("could not delete alert {} for dashboard", alert.uid)))?;
        }

        self.delete_dashboard_document(cancel, uid).await
    }
}
