//! Per-session conversation memory: rolling summary plus recent turns.

use factchat_core::message::Message;
use serde::{Deserialize, Serialize};

/// Default number of unsummarized turns tolerated before compression.
pub const DEFAULT_SUMMARIZE_AFTER: usize = 10;

/// Default number of turns kept verbatim after compression.
pub const DEFAULT_KEEP_RECENT: usize = 5;

/// The state one session carries between questions.
///
/// `pending_turns` counts question/answer pairs appended to `history` since
/// the last compression. Only the orchestrator mutates this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Rendered summary of older turns (empty until the first compression)
    pub summary: Vec<Message>,

    /// Recent raw turns, two messages per turn
    pub history: Vec<Message>,

    pub pending_turns: usize,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one rendered question/answer pair as a turn.
    pub fn push_turn(&mut self, pair: Vec<Message>) {
        self.history.extend(pair);
        self.pending_turns += 1;
    }

    /// Whether the pending turn count has crossed `threshold`.
    pub fn needs_compression(&self, threshold: usize) -> bool {
        self.pending_turns > threshold
    }

    /// Install a new summary and keep only the last `keep_turns` turns.
    pub fn compress(&mut self, summary: Vec<Message>, keep_turns: usize) {
        let keep = keep_turns * 2;
        if self.history.len() > keep {
            self.history.drain(..self.history.len() - keep);
        }
        self.summary = summary;
        self.pending_turns = 0;
    }

    /// Forget everything. Idempotent.
    pub fn clear(&mut self) {
        self.summary.clear();
        self.history.clear();
        self.pending_turns = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.history.is_empty() && self.pending_turns == 0
    }

    /// Number of turns currently held verbatim.
    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }
}
