//! Prompt templates: the fixed message skeletons every prompt is built from.
//!
//! A full question prompt is assembled in this order:
//!
//! | Part | Template | Placeholders |
//! |------|----------|--------------|
//! | Instructions | [`TemplateName::Intro`] | none |
//! | Background | [`TemplateName::ContextWrap`] | `{context}` |
//! | Older turns | [`TemplateName::SummaryWrap`] | `{conversation_summary}` |
//! | Recent turns | [`TemplateName::QaPair`] per turn | `{question}`, `{answer}` |
//! | The question | [`TemplateName::Question`] | `{standard_context}`, `{tools}`, `{question}` |
//!
//! [`TemplateName::SummarizeInstruction`] is only used to ask the model for a
//! summary when history is compressed.
//!
//! Substitution is single pass: a field value containing `{...}` is inserted
//! verbatim and never expanded again.

use factchat_core::error::TemplateError;
use factchat_core::message::{Message, Role};
use std::collections::HashMap;

/// The templates the conversation engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Intro,
    SummaryWrap,
    ContextWrap,
    QaPair,
    Question,
    SummarizeInstruction,
}

impl TemplateName {
    pub const ALL: [TemplateName; 6] = [
        TemplateName::Intro,
        TemplateName::SummaryWrap,
        TemplateName::ContextWrap,
        TemplateName::QaPair,
        TemplateName::Question,
        TemplateName::SummarizeInstruction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateName::Intro => "intro",
            TemplateName::SummaryWrap => "summary_wrap",
            TemplateName::ContextWrap => "context_wrap",
            TemplateName::QaPair => "qa_pair",
            TemplateName::Question => "question",
            TemplateName::SummarizeInstruction => "summarize_instruction",
        }
    }

    /// The fields the engine supplies when rendering this template.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            TemplateName::Intro | TemplateName::SummarizeInstruction => &[],
            TemplateName::SummaryWrap => &["conversation_summary"],
            TemplateName::ContextWrap => &["context"],
            TemplateName::QaPair => &["question", "answer"],
            TemplateName::Question => &["question", "standard_context", "tools"],
        }
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message skeleton: a role plus content with `{field}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub role: Role,
    pub content: String,
}

impl MessageTemplate {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Every placeholder name referenced by this skeleton, in order.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.content.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) if is_field_name(&after[..end]) => {
                    names.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                _ => rest = after,
            }
        }
        names
    }

    fn render(&self, template: TemplateName, fields: &HashMap<&str, &str>) -> Result<Message, TemplateError> {
        let mut out = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) if is_field_name(&after[..end]) => {
                    let field = &after[..end];
                    let value = fields.get(field).ok_or_else(|| TemplateError::MissingField {
                        template: template.as_str().to_string(),
                        field: field.to_string(),
                    })?;
                    out.push_str(value);
                    rest = &after[end + 1..];
                }
                // A lone brace is literal text
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Ok(Message::new(self.role, out))
    }
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Holds every named template and renders them into messages.
#[derive(Debug, Clone)]
pub struct PromptTemplateLibrary {
    templates: HashMap<TemplateName, Vec<MessageTemplate>>,
}

impl PromptTemplateLibrary {
    /// The built-in assistant templates.
    pub fn new() -> Self {
        use Role::{Assistant, System, User};

        let mut templates = HashMap::new();
        templates.insert(
            TemplateName::Intro,
            vec![
                MessageTemplate::new(
                    System,
                    "You are a helpful assistant. Your job is to answer questions based on \
                     knowledge provided in the context or conversation history.",
                ),
                MessageTemplate::new(
                    System,
                    "Use a conversational tone. Avoid being tentative and do not remind the \
                     user that you are an AI model.",
                ),
            ],
        );
        templates.insert(
            TemplateName::SummaryWrap,
            vec![MessageTemplate::new(
                System,
                "This is a summary of older conversations organized by topic: \
                 {conversation_summary}. Use it to answer the question below.",
            )],
        );
        templates.insert(
            TemplateName::ContextWrap,
            vec![MessageTemplate::new(
                System,
                "This is some background information that might be helpful to answer the \
                 questions: {context}",
            )],
        );
        templates.insert(
            TemplateName::QaPair,
            vec![
                MessageTemplate::new(User, "{question}"),
                MessageTemplate::new(Assistant, "{answer}"),
            ],
        );
        templates.insert(
            TemplateName::Question,
            vec![
                MessageTemplate::new(System, "This is some context for the conversation: {standard_context}"),
                MessageTemplate::new(
                    System,
                    "If you cannot answer the question from what you know, ask me to run a \
                     tool by including exactly one call in your response, written as \
                     $tool(argument). For example, to search the web for a term write \
                     $search(search term). I will run the tool and give you the result. \
                     Do not give up without at least attempting a search.\n\
                     Available tools:\n{tools}",
                ),
                MessageTemplate::new(User, "Question: {question}"),
            ],
        );
        templates.insert(
            TemplateName::SummarizeInstruction,
            vec![
                MessageTemplate::new(System, "You are a helpful assistant."),
                MessageTemplate::new(
                    System,
                    "Summarize the conversation below. When the conversation involves \
                     multiple people or topics, write at most one summary per topic. \
                     Respond in plain text.",
                ),
            ],
        );

        Self { templates }
    }

    /// Replace or add a template.
    ///
    /// Fails if the skeleton references a field the engine never supplies
    /// for `name`, which would otherwise fail every render.
    pub fn with_template(mut self, name: TemplateName, skeleton: Vec<MessageTemplate>) -> Result<Self, TemplateError> {
        let allowed = name.fields();
        if let Some(field) = skeleton
            .iter()
            .flat_map(|m| m.placeholders())
            .find(|f| !allowed.contains(f))
        {
            return Err(TemplateError::UnsupportedField {
                template: name.as_str().to_string(),
                field: field.to_string(),
            });
        }
        self.templates.insert(name, skeleton);
        Ok(self)
    }

    pub fn get(&self, name: TemplateName) -> Option<&[MessageTemplate]> {
        self.templates.get(&name).map(Vec::as_slice)
    }

    /// Render `name`, substituting every placeholder from `fields`.
    ///
    /// Roles are never altered. Extra fields are ignored.
    pub fn render(&self, name: TemplateName, fields: &[(&str, &str)]) -> Result<Vec<Message>, TemplateError> {
        let skeleton = self
            .templates
            .get(&name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.as_str().to_string()))?;
        let fields: HashMap<&str, &str> = fields.iter().copied().collect();

        skeleton.iter().map(|m| m.render(name, &fields)).collect()
    }

    // Convenience wrappers for the fixed field sets.

    pub fn intro(&self) -> Result<Vec<Message>, TemplateError> {
        self.render(TemplateName::Intro, &[])
    }

    pub fn summary_wrap(&self, summary: &str) -> Result<Vec<Message>, TemplateError> {
        self.render(TemplateName::SummaryWrap, &[("conversation_summary", summary)])
    }

    pub fn context_wrap(&self, context: &str) -> Result<Vec<Message>, TemplateError> {
        self.render(TemplateName::ContextWrap, &[("context", context)])
    }

    pub fn qa_pair(&self, question: &str, answer: &str) -> Result<Vec<Message>, TemplateError> {
        self.render(TemplateName::QaPair, &[("question", question), ("answer", answer)])
    }

    pub fn question(&self, question: &str, standard_context: &str, tools: &str) -> Result<Vec<Message>, TemplateError> {
        self.render(
            TemplateName::Question,
            &[
                ("question", question),
                ("standard_context", standard_context),
                ("tools", tools),
            ],
        )
    }

    pub fn summarize_instruction(&self) -> Result<Vec<Message>, TemplateError> {
        self.render(TemplateName::SummarizeInstruction, &[])
    }
}

impl Default for PromptTemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}
