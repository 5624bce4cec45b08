//! TaskTracker trait and the Asana REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::types::{DataEnvelope, ErrorEnvelope};
use super::{CreatedTask, NewTask, TrackerError};
use crate::config::AsanaConfig;

/// Something that can turn a [`NewTask`] into a ticket
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Create one ticket
    async fn create_task(&self, task: &NewTask) -> Result<CreatedTask, TrackerError>;

    /// Display name of the backing service, used in prompts and output
    fn service_name(&self) -> &'static str {
        "Asana"
    }
}

/// Asana REST API client authenticated with a personal access token
pub struct AsanaClient {
    token: String,
    base_url: String,
    http: Client,
}

impl AsanaClient {
    /// Create a client from configuration, reading the token from the environment
    pub fn from_config(config: &AsanaConfig) -> Result<Self, TrackerError> {
        debug!(base_url = %config.base_url, token_env = %config.token_env, "AsanaClient::from_config: called");
        let token = config
            .get_token()
            .map_err(|_| TrackerError::MissingToken(config.token_env.clone()))?;

        Self::new(token, &config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(token: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskagent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }
}

/// Pull the first `errors[].message` out of an error body, or fall back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => match env.errors.into_iter().next() {
            Some(first) => first.message,
            None => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl TaskTracker for AsanaClient {
    async fn create_task(&self, task: &NewTask) -> Result<CreatedTask, TrackerError> {
        debug!(name = %task.name, due_on = %task.due_on, "AsanaClient::create_task: called");
        let response = self
            .http
            .post(self.tasks_url())
            .bearer_auth(&self.token)
            .header("accept", "application/json")
            .json(&task.to_body())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, "AsanaClient::create_task: API error");
            return Err(TrackerError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let envelope: DataEnvelope<CreatedTask> =
            serde_json::from_str(&text).map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;

        info!(gid = %envelope.data.gid, name = %envelope.data.name, "Created Asana task");
        Ok(envelope.data)
    }
}
