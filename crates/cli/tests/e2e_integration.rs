//! End-to-end tests for the factchat pipeline.
//!
//! These drive the gateway router over the real orchestrator, the web
//! search tool, the embedding index and a directory-backed fact store,
//! with the completion provider and search backend scripted.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use factchat_agent::{ContextProvider, ConversationOrchestrator, SessionManager};
use factchat_core::SessionId;
use factchat_core::error::{ProviderError, ToolError};
use factchat_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};
use factchat_core::tool::ToolRegistry;
use factchat_gateway::{GatewayState, SharedState, build_router};
use factchat_memory::{DirectoryBlobStore, EmbeddingIndex, FactStore};
use factchat_tools::{SearchBackend, WebSearchTool};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

// ── Mocks ────────────────────────────────────────────────────────────────

/// Replays scripted completions in order and records every prompt.
/// Embeds text as keyword presence over [rust, dune].
struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt_text(&self, call: usize) -> String {
        self.prompts.lock().unwrap()[call]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request);
            prompts.len()
        };
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted at call #{call}"));
        Ok(ProviderResponse {
            content,
            usage: None,
            model: "mock".into(),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embeddings = request
            .inputs
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                ["rust", "dune"]
                    .iter()
                    .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
        })
    }
}

/// A search backend returning one canned SerpAPI response.
struct CannedSearch {
    response: Value,
    queries: Mutex<Vec<String>>,
}

impl CannedSearch {
    fn new(response: Value) -> Arc<Self> {
        Arc::new(Self {
            response,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SearchBackend for CannedSearch {
    async fn search(&self, query: &str) -> Result<Value, ToolError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.response.clone())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn gateway(
    provider: Arc<ScriptedProvider>,
    search: Arc<CannedSearch>,
    index: EmbeddingIndex,
    data_dir: &Path,
    allow_kill_all: bool,
) -> SharedState {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(WebSearchTool::new(search)));

    let orchestrator = ConversationOrchestrator::new(
        provider,
        Arc::new(tools),
        ContextProvider::new(Arc::new(index)),
    )
    .with_username("tester")
    .with_compression(3, 1);

    let facts = FactStore::new(Arc::new(DirectoryBlobStore::new(data_dir.join("blobs"))))
        .with_kill_all(allow_kill_all);

    Arc::new(GatewayState::new(
        SessionManager::new(Arc::new(orchestrator)),
        facts,
        data_dir.join("exports"),
    ))
}

async fn post(state: &SharedState, body: Value) -> (StatusCode, Value) {
    let app = build_router(state.clone(), &["http://localhost:3000".to_string()]);
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn ask(text: &str) -> Value {
    json!({"text": text, "command": "get-response"})
}

// ── E2E: tool-augmented answers ──────────────────────────────────────────

#[tokio::test]
async fn e2e_search_result_feeds_second_completion() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&[
        "$search(\"rust 1.0 release date\")",
        "Rust 1.0 was released on May 15, 2015.",
    ]);
    let search = CannedSearch::new(json!({
        "answer_box": {"answer": "May 15, 2015"},
        "organic_results": [{"link": "https://blog.rust-lang.org/2015/05/15/Rust-1.0.html"}]
    }));
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider.clone(), search.clone(), index, dir.path(), false);

    let (status, reply) = post(&state, ask("When was Rust 1.0 released?")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, json!({"type": "Text", "text": "Rust 1.0 was released on May 15, 2015."}));
    assert_eq!(search.queries.lock().unwrap().as_slice(), ["rust 1.0 release date"]);
    assert_eq!(provider.calls(), 2);
    // The second prompt carries the search result as a turn
    assert!(provider.prompt_text(1).contains("May 15, 2015"));

    // Tool turn and final turn both recorded
    let session = state.sessions.snapshot(&SessionId::default()).await;
    assert_eq!(session.pending_turns, 2);
}

#[tokio::test]
async fn e2e_repeated_tool_call_answers_with_tool_result() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&["$search(weather)", "$search(weather today)"]);
    let search = CannedSearch::new(json!({"answer_box": {"snippet": "Sunny, 25C"}}));
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider.clone(), search.clone(), index, dir.path(), false);

    let (_, reply) = post(&state, ask("What's the weather?")).await;

    assert_eq!(reply["text"], "Sunny, 25C");
    assert_eq!(search.queries.lock().unwrap().len(), 2);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn e2e_unknown_tool_returns_model_text() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&["$calculator(2+2)"]);
    let search = CannedSearch::new(json!({}));
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider.clone(), search.clone(), index, dir.path(), false);

    let (_, reply) = post(&state, ask("What is 2+2?")).await;

    assert_eq!(reply["text"], "$calculator(2+2)");
    assert!(search.queries.lock().unwrap().is_empty());
    assert_eq!(provider.calls(), 1);
}

// ── E2E: background retrieval ────────────────────────────────────────────

#[tokio::test]
async fn e2e_indexed_fact_appears_in_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let facts_file = dir.path().join("facts.jsonl");
    std::fs::write(
        &facts_file,
        concat!(
            "{\"prompt\": \"Who wrote Dune?\", \"completion\": \"Frank Herbert\"}\n",
            "{\"fact\": \"Rust was first released in 2015\"}\n",
        ),
    )
    .unwrap();

    let provider = ScriptedProvider::new(&["Frank Herbert wrote it."]);
    let index = EmbeddingIndex::open(dir.path().join("index.jsonl"), provider.clone(), "embed");
    assert_eq!(index.index_facts(&facts_file).await.unwrap(), 2);

    // Reopening reads the persisted records back
    let index = EmbeddingIndex::open(dir.path().join("index.jsonl"), provider.clone(), "embed");
    assert_eq!(index.len().await, 2);

    let state = gateway(provider.clone(), CannedSearch::new(json!({})), index, dir.path(), false);
    let (_, reply) = post(&state, ask("who wrote dune")).await;

    assert_eq!(reply["text"], "Frank Herbert wrote it.");
    let prompt = provider.prompt_text(0);
    assert!(prompt.contains("Who wrote Dune? Frank Herbert"));
    assert!(!prompt.contains("first released in 2015"));
}

// ── E2E: conversation lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn e2e_history_compresses_then_clears() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&["a1", "a2", "a3", "a4", "SUMMARY: four questions", "a5"]);
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider.clone(), CannedSearch::new(json!({})), index, dir.path(), false);

    for q in ["q1", "q2", "q3", "q4"] {
        post(&state, ask(q)).await;
    }

    let session = state.sessions.snapshot(&SessionId::default()).await;
    assert_eq!(session.pending_turns, 0);
    assert_eq!(session.turns(), 1);
    assert!(session.summary.iter().any(|m| m.content.contains("SUMMARY: four questions")));

    post(&state, ask("q5")).await;
    assert!(provider.prompt_text(5).contains("SUMMARY: four questions"));

    let (_, reply) = post(&state, json!({"text": "", "command": "clear-history"})).await;
    assert_eq!(reply["text"], "History cleared.");
    assert!(state.sessions.snapshot(&SessionId::default()).await.is_empty());
}

#[tokio::test]
async fn e2e_sessions_do_not_share_history() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&["alpha answer", "beta answer"]);
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider.clone(), CannedSearch::new(json!({})), index, dir.path(), false);

    post(&state, json!({"text": "alpha question", "command": "get-response", "session": "one"})).await;
    post(&state, json!({"text": "beta question", "command": "get-response", "session": "two"})).await;

    assert!(!provider.prompt_text(1).contains("alpha"));
}

// ── E2E: facts and training export ───────────────────────────────────────

#[tokio::test]
async fn e2e_facts_persist_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&[]);
    let index = EmbeddingIndex::new(provider.clone(), "embed");
    let state = gateway(provider, CannedSearch::new(json!({})), index, dir.path(), false);

    for (prompt, completion) in [("Who wrote Dune?", "Frank Herbert"), ("Capital of France?", "Paris")] {
        let (status, reply) = post(
            &state,
            json!({"text": {"prompt": prompt, "completion": completion}, "command": "write-fact"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(reply["text"].as_str().unwrap().starts_with("Fact stored as blob."));
        // Keys carry millisecond timestamps
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let blobs: Vec<_> = std::fs::read_dir(dir.path().join("blobs")).unwrap().collect();
    assert_eq!(blobs.len(), 2);

    let (status, reply) = post(&state, json!({"text": "", "command": "create-training-file"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply["text"].as_str().unwrap().starts_with("Wrote 2 facts to "));

    let export = std::fs::read_dir(dir.path().join("exports"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let lines: Vec<Value> = std::fs::read_to_string(export)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"prompt": "Who wrote Dune?", "completion": " Frank Herbert"}),
            json!({"prompt": "Capital of France?", "completion": " Paris"}),
        ]
    );

    // A cutoff after every stored key exports nothing
    let (_, reply) = post(&state, json!({"text": "2999-01-01", "command": "create-training-file"})).await;
    assert!(reply["text"].as_str().unwrap().starts_with("Wrote 0 facts to "));
}

#[tokio::test]
async fn e2e_kill_all_facts_guarded() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(&[]);

    let guarded = gateway(
        provider.clone(),
        CannedSearch::new(json!({})),
        EmbeddingIndex::new(provider.clone(), "embed"),
        dir.path(),
        false,
    );
    post(&guarded, json!({"text": {"prompt": "p", "completion": "c"}, "command": "write-fact"})).await;

    let (_, reply) = post(&guarded, json!({"text": "", "command": "kill-all-facts"})).await;
    assert_eq!(reply["text"], "Deleting all facts is disabled.");
    assert_eq!(std::fs::read_dir(dir.path().join("blobs")).unwrap().count(), 1);

    let enabled = gateway(
        provider.clone(),
        CannedSearch::new(json!({})),
        EmbeddingIndex::new(provider, "embed"),
        dir.path(),
        true,
    );
    let (_, reply) = post(&enabled, json!({"text": "", "command": "kill-all-facts"})).await;
    assert_eq!(reply["text"], "Deleted 1 facts.");
    assert_eq!(std::fs::read_dir(dir.path().join("blobs")).unwrap().count(), 0);
}
