use std::time::Duration;

use crate::errors::GenerateError;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the plan-generation HTTP client.
#[derive(Clone, Debug)]
pub struct PlannerClientConfig {
    /// Base URL of the travel-planner API (scheme + host, optional prefix).
    pub base_url: String,
    /// Bearer token forwarded as-is. Never inspected by this crate.
    pub api_token: Option<String>,
    /// Deadline for establishing the connection.
    ///
    /// A generation may stream for as long as the server keeps it open;
    /// whole-run deadlines belong to `PlanGeneratorBuilder::timeout`, which
    /// ends in cancellation.
    pub connect_timeout: Duration,
}

impl PlannerClientConfig {
    /// Creates a config with the default connect timeout and no token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `PLANNER_API_BASE_URL` (required)
    /// - `PLANNER_API_TOKEN` (optional)
    /// - `PLANNER_CONNECT_TIMEOUT_SECS` (optional, default 30)
    pub fn from_env() -> Result<Self, GenerateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GenerateError> {
        let base_url = lookup("PLANNER_API_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(GenerateError::Config(
                "missing PLANNER_API_BASE_URL for planner client".into(),
            ));
        }
        let mut config = Self::new(base_url.trim());
        if let Some(token) = lookup("PLANNER_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            config = config.api_token(token);
        }
        if let Some(raw) = lookup("PLANNER_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GenerateError::Config(format!("invalid PLANNER_CONNECT_TIMEOUT_SECS: {raw}"))
            })?;
            config = config.connect_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Sets the bearer token.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Overrides the default connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub(crate) fn generate_url(&self, project_id: &str) -> String {
        format!(
            "{}/api/projects/{}/plans/generate",
            self.base_url.trim_end_matches('/'),
            project_id
        )
    }
}
