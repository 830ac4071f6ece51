//! Detects a tool call embedded in model output.
//!
//! The model asks for a tool by writing `$name(argument)`. The argument may
//! be wrapped in single or double quotes, but only when the same quote
//! character closes it; `$search("x')` is not a call.

use factchat_core::tool::ToolCall;
use regex_lite::Regex;
use std::sync::LazyLock;

/// `$name(` then a single-quoted, double-quoted, or bare argument, then `)`.
const TOOL_CALL_PATTERN: &str =
    r#"\$(\w+)\(\s*(?:'([^'"]+)'|"([^'"]+)"|([^'"]+?))\s*\)"#;

static TOOL_CALL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(TOOL_CALL_PATTERN).ok());

/// Return the first tool call in `text`, if any.
pub fn parse(text: &str) -> Option<ToolCall> {
    let captures = TOOL_CALL.as_ref()?.captures(text)?;
    let name = captures.get(1)?.as_str();
    let argument = (2..=4).find_map(|i| captures.get(i))?.as_str();

    Some(ToolCall {
        name: name.to_string(),
        argument: argument.to_string(),
    })
}
