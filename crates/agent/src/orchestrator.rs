//! The conversation engine: prompt assembly, tool loop, history compression.
//!
//! One call to [`ConversationOrchestrator::answer`] runs:
//!
//! 1. **Retrieve** background for the question
//! 2. **Build** intro + background + summary + history + question
//! 3. **Complete** the prompt
//! 4. **If a `$tool(arg)` call is found**: run it, record the result as a
//!    turn, and go back to step 2 (at most [`MAX_ATTEMPTS`] completions)
//! 5. **Record** the final answer as a turn, compressing history if needed
//!
//! All work happens on a copy of the session state, committed only when the
//! answer is complete. Any failure leaves the session untouched and the
//! caller gets [`APOLOGY`].

use crate::context::ContextProvider;
use crate::parser;
use crate::prompt::PromptTemplateLibrary;
use crate::response::{self, Reply};
use crate::state::{ConversationState, DEFAULT_KEEP_RECENT, DEFAULT_SUMMARIZE_AFTER};
use factchat_config::AppConfig;
use factchat_core::error::{Error, ProviderError, ToolError};
use factchat_core::message::Message;
use factchat_core::provider::{CompletionSettings, ImageRequest, Provider};
use factchat_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Completion calls per question, tool turns included.
pub const MAX_ATTEMPTS: usize = 2;

/// What the user sees when answering fails for any reason.
pub const APOLOGY: &str = "Sorry, I hit an internal error. Please try again.";

/// Candidates requested per image prompt; only the first URL is used.
const IMAGE_CANDIDATES: u32 = 2;

pub struct ConversationOrchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    context: ContextProvider,
    templates: PromptTemplateLibrary,
    settings: CompletionSettings,
    username: String,
    summarize_after: usize,
    keep_recent: usize,
    provider_timeout: Duration,
    image_size: String,
}

impl ConversationOrchestrator {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, context: ContextProvider) -> Self {
        Self {
            provider,
            tools,
            context,
            templates: PromptTemplateLibrary::new(),
            settings: CompletionSettings::new("gpt-3.5-turbo"),
            username: "user".into(),
            summarize_after: DEFAULT_SUMMARIZE_AFTER,
            keep_recent: DEFAULT_KEEP_RECENT,
            provider_timeout: Duration::from_secs(60),
            image_size: "1024x1024".into(),
        }
    }

    /// Wire an orchestrator with model, user, compression and timeout settings
    /// taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        context: ContextProvider,
    ) -> Self {
        let completion = &config.completion;
        let settings = CompletionSettings {
            model: completion.model.clone(),
            temperature: completion.temperature,
            top_p: completion.top_p,
            frequency_penalty: completion.frequency_penalty,
            presence_penalty: completion.presence_penalty,
            max_tokens: completion.max_tokens,
        };

        Self::new(provider, tools, context)
            .with_settings(settings)
            .with_username(config.conversation.username.clone())
            .with_compression(
                config.conversation.summarize_after_turns,
                config.conversation.keep_recent_turns,
            )
            .with_provider_timeout(config.timeouts.provider())
            .with_image_size(completion.image_size.clone())
    }

    pub fn with_templates(mut self, templates: PromptTemplateLibrary) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Compress once more than `after` turns are pending, keeping `keep` turns.
    pub fn with_compression(mut self, after: usize, keep: usize) -> Self {
        self.summarize_after = after;
        self.keep_recent = keep;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = size.into();
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `question`, updating `state` only on success.
    ///
    /// Never fails: errors are logged and replaced by [`APOLOGY`].
    pub async fn answer(&self, state: &mut ConversationState, question: &str) -> String {
        match self.try_answer(state, question).await {
            Ok((answer, updated)) => {
                *state = updated;
                answer
            }
            Err(e) => {
                error!(error = %e, "Failed to answer question");
                APOLOGY.to_string()
            }
        }
    }

    /// Answer and tag the reply. Image requests bypass the conversation and
    /// never enter history.
    pub async fn respond(&self, state: &mut ConversationState, question: &str) -> Reply {
        if let Some(prompt) = response::image_prompt(question) {
            return self.image_reply(prompt).await;
        }

        let answer = self.answer(state, question).await;
        response::classify(&answer)
    }

    /// Generate an image for `prompt`. Needs no conversation state.
    pub async fn image_reply(&self, prompt: &str) -> Reply {
        match self.generate_image(prompt).await {
            Ok(url) => Reply::image(url),
            Err(e) => {
                error!(error = %e, "Image generation failed");
                Reply::text(APOLOGY)
            }
        }
    }

    /// Wipe summary, history, and counter.
    pub fn reset(&self, state: &mut ConversationState) {
        state.clear();
        debug!("Conversation state cleared");
    }

    async fn try_answer(
        &self,
        state: &ConversationState,
        question: &str,
    ) -> Result<(String, ConversationState), Error> {
        let background = self.context.retrieve_background(question).await?;
        let mut working = state.clone();
        let mut answer = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let prompt = self.build_prompt(&working, question, &background)?;
            let raw = self.complete(prompt).await?;

            let Some(call) = parser::parse(&raw) else {
                answer = raw;
                break;
            };

            debug!(tool = %call.name, argument = %call.argument, attempt, "Model requested a tool");
            match self.tools.execute(&call).await {
                Ok(output) => {
                    info!(tool = %call.name, sources = ?output.provenance, "Tool answered");
                    self.append_turn(&mut working, &call.argument, &output.result).await?;
                    if attempt == MAX_ATTEMPTS {
                        answer = output.result;
                    }
                }
                Err(ToolError::NotFound(name)) => {
                    debug!(tool = %name, "Unknown tool requested, using model text as the answer");
                    answer = raw;
                    break;
                }
                Err(e) => {
                    warn!(tool = %call.name, argument = %call.argument, error = %e, "Tool failed, using model text as the answer");
                    answer = raw;
                    break;
                }
            }
        }

        if !answer.is_empty() {
            self.append_turn(&mut working, question, &answer).await?;
        }

        Ok((answer, working))
    }

    /// intro ++ background ++ summary ++ history ++ question
    fn build_prompt(
        &self,
        state: &ConversationState,
        question: &str,
        background: &str,
    ) -> Result<Vec<Message>, Error> {
        let ambient = self.context.ambient_context(&self.username);

        let mut prompt = self.templates.intro()?;
        prompt.extend(self.templates.context_wrap(background)?);
        prompt.extend(state.summary.iter().cloned());
        prompt.extend(state.history.iter().cloned());
        prompt.extend(self.templates.question(question, &ambient, &self.describe_tools())?);
        Ok(prompt)
    }

    fn describe_tools(&self) -> String {
        self.tools
            .describe()
            .iter()
            .map(|d| format!("- ${}({}): {}", d.name, d.parameter_hint, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn append_turn(&self, state: &mut ConversationState, question: &str, answer: &str) -> Result<(), Error> {
        state.push_turn(self.templates.qa_pair(question, answer)?);
        if state.needs_compression(self.summarize_after) {
            self.compress(state).await?;
        }
        Ok(())
    }

    async fn compress(&self, state: &mut ConversationState) -> Result<(), Error> {
        let mut prompt = self.templates.summarize_instruction()?;
        prompt.extend(state.history.iter().cloned());

        let summary = self.complete(prompt).await?;
        let turns_before = state.turns();
        state.compress(self.templates.summary_wrap(&summary)?, self.keep_recent);

        info!(turns_before, turns_kept = state.turns(), "Conversation history compressed");
        Ok(())
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        let request = self.settings.request(messages);
        let response = tokio::time::timeout(self.provider_timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.provider_timeout.as_secs()
                ))
            })??;
        Ok(response.content)
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ImageRequest {
            prompt: prompt.to_string(),
            n: IMAGE_CANDIDATES,
            size: self.image_size.clone(),
        };
        let response = tokio::time::timeout(self.provider_timeout, self.provider.image(request))
            .await
            .map_err(|_| ProviderError::Timeout(format!("image generation exceeded {}s", self.provider_timeout.as_secs())))??;
        info!(url = %response.url, "Image generated");
        Ok(response.url)
    }
}
