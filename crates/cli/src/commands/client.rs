//! HTTP client for the gateway's command endpoint.

use super::CliResult;
use factchat_agent::{MAX_ATTEMPTS, Reply};
use factchat_config::{AppConfig, TimeoutConfig};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// Bound on commands that do not wait on the model.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which gateway and session a client command talks to.
#[derive(Debug, Clone)]
pub struct Target {
    pub server: String,
    pub session: Option<String>,
}

pub struct GatewayClient {
    http: reqwest::Client,
    url: String,
    session: Option<String>,
}

impl GatewayClient {
    pub fn new(target: &Target, timeout: Duration) -> CliResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: target.server.trim_end_matches('/').to_string() + "/",
            session: target.session.clone(),
        })
    }

    /// A client whose timeout covers a full answer: every completion
    /// attempt, a history summary, one tool call and the background lookup.
    pub fn for_answers(target: &Target) -> CliResult<Self> {
        let timeouts = match AppConfig::load() {
            Ok(config) => config.timeouts,
            Err(e) => {
                warn!(error = %e, "Config unreadable, using default timeouts");
                TimeoutConfig::default()
            }
        };
        Self::new(target, answer_budget(&timeouts))
    }

    /// Send `command` with `text` and decode the `{type, text}` reply.
    pub async fn send(&self, command: &str, text: Value) -> CliResult<Reply> {
        let mut body = json!({ "text": text, "command": command });
        if let Some(session) = &self.session {
            body["session"] = json!(session);
        }

        debug!(command, url = %self.url, "Sending command");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Could not reach {}: {e}", self.url))?;

        let status = response.status();
        let raw = response.text().await?;
        let reply = serde_json::from_str::<Reply>(&raw).ok();

        if !status.is_success() {
            let message = reply.map(|r| r.text).unwrap_or(raw);
            return Err(format!("Server error ({status}): {message}").into());
        }

        reply.ok_or_else(|| format!("Unexpected response from server: {raw}").into())
    }
}

pub fn answer_budget(timeouts: &TimeoutConfig) -> Duration {
    let completions = u32::try_from(MAX_ATTEMPTS + 1).unwrap_or(u32::MAX);
    timeouts.provider() * completions + timeouts.tool() + timeouts.retrieval()
}
