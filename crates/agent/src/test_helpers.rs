//! Shared test doubles for orchestrator and session tests.

use async_trait::async_trait;
use factchat_core::error::{ProviderError, ToolError};
use factchat_core::provider::{ImageRequest, ImageResponse, Provider, ProviderRequest, ProviderResponse};
use factchat_core::tool::{Tool, ToolOutput};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A provider that replays scripted completions and records every request.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    repeat_last: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            repeat_last: false,
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Returns `text` for every call.
    pub fn always(text: &str) -> Self {
        Self {
            repeat_last: true,
            ..Self::texts(&[text])
        }
    }

    pub fn failing() -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![Err(ProviderError::Network("connection refused".into()))])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        let mut responses = self.responses.lock().unwrap();
        let next = if self.repeat_last && responses.len() == 1 {
            responses.front().cloned()
        } else {
            responses.pop_front()
        };
        let content = next.unwrap_or_else(|| panic!("ScriptedProvider: no response for call #{call}"))?;

        Ok(ProviderResponse {
            content,
            usage: None,
            model: "scripted-model".into(),
        })
    }

    async fn image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
        Ok(ImageResponse {
            url: format!("https://images.example/{}.png", request.prompt.replace(' ', "-")),
        })
    }
}

/// A tool that answers with a fixed result and counts invocations.
pub struct StubTool {
    name: &'static str,
    result: Result<ToolOutput, ToolError>,
    calls: AtomicUsize,
    arguments: Mutex<Vec<String>>,
}

impl StubTool {
    pub fn answering(name: &'static str, result: &str) -> Self {
        Self::new(
            name,
            Ok(ToolOutput {
                result: result.into(),
                provenance: vec!["https://source.example/1".into()],
            }),
        )
    }

    pub fn failing(name: &'static str) -> Self {
        Self::new(
            name,
            Err(ToolError::ExecutionFailed {
                tool_name: name.into(),
                reason: "upstream unavailable".into(),
            }),
        )
    }

    fn new(name: &'static str, result: Result<ToolOutput, ToolError>) -> Self {
        Self {
            name,
            result,
            calls: AtomicUsize::new(0),
            arguments: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn arguments(&self) -> Vec<String> {
        self.arguments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Stub tool for tests"
    }

    fn parameter_hint(&self) -> &str {
        "anything"
    }

    async fn execute(&self, argument: &str) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.arguments.lock().unwrap().push(argument.to_string());
        self.result.clone()
    }
}
