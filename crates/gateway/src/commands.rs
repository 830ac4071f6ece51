//! The command endpoint: `POST /` with `{text, command, session?}`.
//!
//! Every reply, including errors, has the shape `{type, text}` so the
//! clients can print `text` without inspecting the status first.

use crate::SharedState;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::NaiveDate;
use factchat_agent::Reply;
use factchat_core::error::StorageError;
use factchat_core::message::SessionId;
use factchat_core::storage::Fact;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, error, warn};

/// Commands understood by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetResponse,
    ClearHistory,
    WriteFact,
    CreateTrainingFile,
    KillAllFacts,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetResponse => "get-response",
            Command::ClearHistory => "clear-history",
            Command::WriteFact => "write-fact",
            Command::CreateTrainingFile => "create-training-file",
            Command::KillAllFacts => "kill-all-facts",
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get-response" => Ok(Command::GetResponse),
            "clear-history" => Ok(Command::ClearHistory),
            "write-fact" => Ok(Command::WriteFact),
            "create-training-file" => Ok(Command::CreateTrainingFile),
            "kill-all-facts" => Ok(Command::KillAllFacts),
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// A question, a fact object, or a date, depending on the command
    #[serde(default)]
    pub text: Value,
    pub command: String,
    #[serde(default)]
    pub session: Option<String>,
}

type CommandResult = Result<Json<Reply>, (StatusCode, Json<Reply>)>;

fn failure(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Reply>) {
    (status, Json(Reply::text(message)))
}

fn storage_failure(err: StorageError) -> (StatusCode, Json<Reply>) {
    error!(error = %err, "Storage command failed");
    failure(StatusCode::INTERNAL_SERVER_ERROR, format!("Storage error: {err}"))
}

pub(crate) async fn command_handler(
    State(state): State<SharedState>,
    Json(req): Json<CommandRequest>,
) -> CommandResult {
    let command = req.command.parse::<Command>().map_err(|message| {
        warn!(command = %req.command, "Unknown command");
        failure(StatusCode::BAD_REQUEST, message)
    })?;

    let session = req
        .session
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(SessionId::from)
        .unwrap_or_default();
    debug!(command = command.as_str(), session = %session, "Command received");

    let reply = match command {
        Command::GetResponse => state.sessions.respond(&session, &question_text(&req.text)).await,

        Command::ClearHistory => {
            state.sessions.reset(&session).await;
            Reply::text("History cleared.")
        }

        Command::WriteFact => {
            let fact = parse_fact(&req.text).map_err(|e| failure(StatusCode::BAD_REQUEST, e))?;
            let key = state.facts.write_fact(&fact).await.map_err(storage_failure)?;
            Reply::text(format!("Fact stored as {key}."))
        }

        Command::CreateTrainingFile => {
            let newer_than = parse_newer_than(&req.text).map_err(|e| failure(StatusCode::BAD_REQUEST, e))?;
            let export = state
                .facts
                .create_training_file(&state.training_dir, newer_than)
                .await
                .map_err(storage_failure)?;
            Reply::text(format!("Wrote {} facts to {}.", export.count, export.path.display()))
        }

        Command::KillAllFacts => match state.facts.kill_all_facts().await {
            Ok(count) => Reply::text(format!("Deleted {count} facts.")),
            Err(StorageError::Disabled(_)) => Reply::text("Deleting all facts is disabled."),
            Err(e) => return Err(storage_failure(e)),
        },
    };

    Ok(Json(reply))
}

fn question_text(text: &Value) -> String {
    match text {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A fact sent as an object, or as a string holding that object's JSON.
fn parse_fact(text: &Value) -> Result<Fact, String> {
    let parsed = match text {
        Value::String(s) => serde_json::from_str::<Fact>(s),
        other => serde_json::from_value::<Fact>(other.clone()),
    };
    parsed.map_err(|e| format!("Invalid fact: {e}"))
}

/// `YYYY-MM-DD`, `{"newer_than": "YYYY-MM-DD"}`, or nothing.
fn parse_newer_than(text: &Value) -> Result<Option<NaiveDate>, String> {
    let raw = match text {
        Value::Null => return Ok(None),
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("newer_than") {
            Some(Value::String(s)) => s.as_str(),
            None | Some(Value::Null) => return Ok(None),
            Some(other) => return Err(format!("Invalid date {other}: expected YYYY-MM-DD")),
        },
        other => return Err(format!("Invalid date {other}: expected YYYY-MM-DD")),
    };

    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("Invalid date '{raw}': expected YYYY-MM-DD"))
}
