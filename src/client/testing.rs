//! In-memory Grafana used by the client tests

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::error::ClientError;
use super::grafana::ALERT_RULES_PATH;
use super::transport::{ApiRequest, ApiResponse, Method, Transport};

#[derive(Default)]
struct State {
    dashboards: BTreeMap<String, Value>,
    rules: Vec<Value>,
    datasources: Vec<Value>,
    next_id: u64,
    failures: Vec<(Method, String)>,
}

/// Fake Grafana keeping dashboards and alert rules in memory and recording
/// every request it receives
#[derive(Default)]
pub struct FakeGrafana {
    state: Mutex<State>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeGrafana {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datasource(self, name: &str, uid: &str) -> Self {
        self.state.lock().datasources.push(json!({
            "id": 1,
            "uid": uid,
            "name": name,
            "type": "prometheus"
        }));
        self
    }

    /// Store an existing rule as Grafana would return it
    pub fn add_rule(&self, uid: &str, title: &str, folder_uid: &str, group: &str, dashboard: &str) {
        self.state.lock().rules.push(json!({
            "uid": uid,
            "title": title,
            "folderUID": folder_uid,
            "ruleGroup": group,
            "condition": "A",
            "data": [],
            "annotations": {"__dashboardUid__": dashboard, "__panelId__": "1"},
            "labels": {}
        }));
    }

    /// Answer 500 to requests with this method on this exact path
    pub fn fail_on(&self, method: Method, path: &str) {
        self.state.lock().failures.push((method, path.to_string()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Requests with the given method, as paths
    pub fn paths(&self, method: Method) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn rules(&self) -> Vec<Value> {
        self.state.lock().rules.clone()
    }

    pub fn rule_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self
            .rules()
            .iter()
            .filter_map(|rule| rule["uid"].as_str().map(String::from))
            .collect();
        uids.sort();
        uids
    }

    pub fn has_dashboard(&self, uid: &str) -> bool {
        self.state.lock().dashboards.contains_key(uid)
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state.lock();

        if state
            .failures
            .iter()
            .any(|(method, path)| *method == request.method && *path == request.path)
        {
            return ApiResponse::new(500, "internal error");
        }

        let body = request.json_body().unwrap_or(Value::Null);
        let path = request.path.as_str();
        let rule_uid = path
            .strip_prefix(ALERT_RULES_PATH)
            .and_then(|rest| rest.strip_prefix('/'));
        let dashboard_uid = path.strip_prefix("/api/dashboards/uid/");

        match (request.method, path) {
            (Method::Post, "/api/dashboards/db") => {
                let mut board = body["dashboard"].clone();
                state.next_id += 1;
                let uid = match board["uid"].as_str() {
                    Some(uid) if !uid.is_empty() => uid.to_string(),
                    _ => format!("generated-{}", state.next_id),
                };
                board["uid"] = json!(uid);
                board["id"] = json!(state.next_id);
                state.dashboards.insert(uid.clone(), board);

                json_response(
                    200,
                    json!({"id": state.next_id, "uid": uid, "url": format!("/d/{}", uid), "status": "success", "version": 1}),
                )
            }
            (Method::Get, "/api/datasources") => json_response(200, Value::Array(state.datasources.clone())),
            (Method::Get, ALERT_RULES_PATH) => json_response(200, Value::Array(state.rules.clone())),
            (Method::Post, ALERT_RULES_PATH) => {
                state.next_id += 1;
                let mut rule = body;
                rule["uid"] = json!(format!("rule-{}", state.next_id));
                state.rules.push(rule.clone());
                json_response(201, rule)
            }
            (Method::Get, _) if dashboard_uid.is_some() => {
                match dashboard_uid.and_then(|uid| state.dashboards.get(uid)) {
                    Some(board) => json_response(200, json!({"dashboard": board, "meta": {}})),
                    None => ApiResponse::new(404, r#"{"message":"Dashboard not found"}"#),
                }
            }
            (Method::Delete, _) if dashboard_uid.is_some() => {
                match dashboard_uid.and_then(|uid| state.dashboards.remove(uid)) {
                    Some(_) => json_response(200, json!({"title": "deleted"})),
                    None => ApiResponse::new(404, r#"{"message":"Dashboard not found"}"#),
                }
            }
            (Method::Put, _) if rule_uid.is_some() => {
                let uid = rule_uid.unwrap_or_default();
                match state.rules.iter_mut().find(|rule| rule["uid"] == uid) {
                    Some(rule) => {
                        *rule = body;
                        json_response(200, rule.clone())
                    }
                    None => ApiResponse::new(404, ""),
                }
            }
            (Method::Delete, _) if rule_uid.is_some() => {
                let uid = rule_uid.unwrap_or_default();
                let before = state.rules.len();
                state.rules.retain(|rule| rule["uid"] != uid);
                if state.rules.len() < before {
                    ApiResponse::new(204, "")
                } else {
                    ApiResponse::new(404, "")
                }
            }
            (Method::Get, _) if rule_uid.is_some() => {
                let uid = rule_uid.unwrap_or_default();
                match state.rules.iter().find(|rule| rule["uid"] == uid) {
                    Some(rule) => json_response(200, rule.clone()),
                    None => ApiResponse::new(404, ""),
                }
            }
            _ => ApiResponse::new(404, "unknown endpoint"),
        }
    }
}

fn json_response(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

#[async_trait]
impl Transport for FakeGrafana {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.handle(&request);
        self.requests.lock().push(request);
        Ok(response)
    }
}

/// Transport that never answers
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, ClientError> {
        std::future::pending().await
    }
}

/// Annotation map of a stored rule
pub fn annotations(rule: &Value) -> HashMap<String, String> {
    serde_json::from_value(rule["annotations"].clone()).unwrap_or_default()
}
