//! Ambient facts and background snippets injected into every prompt.

use chrono::{Local, NaiveDateTime};
use factchat_core::error::MemoryError;
use factchat_core::memory::{BackgroundRetriever, NoBackground};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where the current time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    /// Always reports the same instant (tests, replayable prompts)
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Supplies the date/time/user block and retrieved background text.
pub struct ContextProvider {
    retriever: Arc<dyn BackgroundRetriever>,
    clock: Clock,
    timeout: Duration,
}

impl ContextProvider {
    pub fn new(retriever: Arc<dyn BackgroundRetriever>) -> Self {
        Self {
            retriever,
            clock: Clock::System,
            timeout: Duration::from_secs(20),
        }
    }

    /// A provider with no background index.
    pub fn without_background() -> Self {
        Self::new(Arc::new(NoBackground))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Date, time and user name in the fixed format the prompts expect.
    pub fn ambient_context(&self, username: &str) -> String {
        format!(
            "\nToday's date: {}\n Current User: {}\n",
            self.clock.now().format("%Y-%m-%d %H:%M:%S"),
            username
        )
    }

    /// Best-matching background snippet for `query`, or empty.
    pub async fn retrieve_background(&self, query: &str) -> Result<String, MemoryError> {
        let found = tokio::time::timeout(self.timeout, self.retriever.find_match(query))
            .await
            .map_err(|_| {
                MemoryError::QueryFailed(format!(
                    "{} lookup timed out after {}s",
                    self.retriever.name(),
                    self.timeout.as_secs()
                ))
            })??;

        debug!(retriever = self.retriever.name(), found = !found.is_empty(), "Background retrieved");
        Ok(found)
    }
}
