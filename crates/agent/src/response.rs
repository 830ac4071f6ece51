//! Reply tagging: plain text, an image URL, or a code block.

use serde::{Deserialize, Serialize};

/// What kind of content a reply carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Text,
    Image,
    Code,
}

/// A reply as sent to clients: `{"type": "Text", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub text: String,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: ResponseKind::Text, text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self { kind: ResponseKind::Image, text: url.into() }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self { kind: ResponseKind::Code, text: code.into() }
    }
}

/// Tag a final answer. A body that is one fenced code block becomes
/// [`ResponseKind::Code`] with the fence and language tag removed.
pub fn classify(answer: &str) -> Reply {
    match strip_code_fence(answer) {
        Some(code) => Reply::code(code),
        None => Reply::text(answer),
    }
}

fn strip_code_fence(text: &str) -> Option<String> {
    let body = text.trim().strip_prefix("```")?.strip_suffix("```")?;
    // First line is the (possibly empty) language tag
    let (_lang, code) = body.split_once('\n')?;
    if code.contains("```") {
        return None;
    }
    Some(code.trim_end_matches('\n').to_string())
}

/// The image prompt when `question` asks for a picture
/// (`/image <prompt>` or `image: <prompt>`).
pub fn image_prompt(question: &str) -> Option<&str> {
    let q = question.trim_start();
    let prompt = q
        .strip_prefix("/image ")
        .or_else(|| q.strip_prefix("image:"))?
        .trim();
    (!prompt.is_empty()).then_some(prompt)
}
