use std::time::Duration;

/// Grafana connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Service account token, sent as a bearer token
    pub api_token: Option<String>,
    /// Username and password, used when no token is set
    pub basic_auth: Option<(String, String)>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a config from environment variables
    /// GRAFANA_URL=http://localhost:3000
    /// GRAFANA_TOKEN=glsa_xxx
    /// GRAFANA_USER=admin
    /// GRAFANA_PASSWORD=admin
    /// GRAFANA_TIMEOUT_SECS=30
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = lookup("GRAFANA_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let api_token = lookup("GRAFANA_TOKEN").filter(|token| !token.is_empty());
        let basic_auth = match (lookup("GRAFANA_USER"), lookup("GRAFANA_PASSWORD")) {
            (Some(user), Some(password)) if !user.is_empty() => Some((user, password)),
            _ => None,
        };
        let timeout = lookup("GRAFANA_TIMEOUT_SECS")
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url,
            api_token,
            basic_auth,
            timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_token: None,
            basic_auth: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[]));

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_token, None);
        assert_eq!(config.basic_auth, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GRAFANA_URL", "https://grafana.internal"),
            ("GRAFANA_TOKEN", "glsa_token"),
            ("GRAFANA_USER", "admin"),
            ("GRAFANA_PASSWORD", "secret"),
            ("GRAFANA_TIMEOUT_SECS", "5"),
        ]));

        assert_eq!(config.base_url, "https://grafana.internal");
        assert_eq!(config.api_token.as_deref(), Some("glsa_token"));
        assert_eq!(
            config.basic_auth,
            Some(("admin".to_string(), "secret".to_string()))
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_timeout_falls_back_to_default() {
        let config = ClientConfig::from_lookup(lookup(&[("GRAFANA_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
