//! End-to-end integration tests for the Sage assistant.
//!
//! These drive the HTTP surface and the chat pipeline together, with a
//! recording completion service standing in for the model and scripted
//! search providers standing in for the web.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use sage_agent::{ChatPipeline, InMemorySessionStore, KnowledgeBase, PipelineSettings};
use sage_config::AppConfig;
use sage_core::completion::{Completion, CompletionRequest, CompletionService};
use sage_core::error::{CompletionError, SearchError};
use sage_core::search::{SearchProvider, SearchResult};
use sage_gateway::{AppState, build_router};
use sage_search::{NO_RESULTS, WebSearch};

// ── Mocks ────────────────────────────────────────────────────────────────

/// Answers "reply to <message>" and keeps every prompt it receives.
struct RecordingCompletion {
    prompts: std::sync::Mutex<Vec<String>>,
}

impl RecordingCompletion {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionService for RecordingCompletion {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let message = request
            .prompt
            .split("<|user|>\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default()
            .to_string();
        self.prompts.lock().unwrap().push(request.prompt);
        Ok(Completion {
            text: format!("reply to {message}"),
            model: "e2e_mock".into(),
            usage: None,
        })
    }
}

struct ScriptedSearch(Vec<SearchResult>);

#[async_trait::async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, _query: &str, max: usize) -> Result<Vec<SearchResult>, SearchError> {
        Ok(self.0.iter().take(max).cloned().collect())
    }
}

struct FailingSearch;

#[async_trait::async_trait]
impl SearchProvider for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
        Err(SearchError::Provider {
            status_code: 429,
            message: "rate limited".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn build_app(
    config: &AppConfig,
    completion: Arc<RecordingCompletion>,
    search: WebSearch,
    knowledge: KnowledgeBase,
) -> Router {
    let pipeline = ChatPipeline::new(
        completion,
        search,
        knowledge,
        Arc::new(InMemorySessionStore::new(config.session.max_history)),
        PipelineSettings::from_config(config),
    );
    let state = Arc::new(AppState::new(Arc::new(pipeline), config.assistant.name.clone()));
    build_router(state, &config.gateway)
}

fn default_app(completion: Arc<RecordingCompletion>) -> Router {
    let search = WebSearch::new(
        Arc::new(ScriptedSearch(vec![SearchResult::new(
            "SAP BTP overview",
            "SAP Business Technology Platform unifies data and AI.",
        )])),
        "SAP",
        3,
    );
    build_app(&AppConfig::default(), completion, search, KnowledgeBase::default())
}

async fn chat(app: &Router, session_id: &str, message: &str) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "message": message, "session_id": session_id });
    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn history(app: &Router, session_id: &str) -> Vec<serde_json::Value> {
    let req = Request::builder()
        .uri(format!("/sessions/{session_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["history"].as_array().cloned().unwrap_or_default()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_greeting_on_fresh_session() {
    let completion = RecordingCompletion::new();
    let app = default_app(completion.clone());

    let (status, body) = chat(&app, "s1", "Hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["response"], "reply to Hello");

    assert_eq!(history(&app, "s1").await.len(), 1);

    let prompt = completion.last_prompt();
    assert!(prompt.contains("This message is a greeting"));
    assert!(prompt.contains("introduce yourself as the SAP AI assistant"));
}

#[tokio::test]
async fn e2e_seven_calls_keep_last_five() {
    let completion = RecordingCompletion::new();
    let app = default_app(completion.clone());

    for i in 1..=7 {
        let (status, _) = chat(&app, "s1", &format!("question {i}")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let history = history(&app, "s1").await;
    assert_eq!(history.len(), 5);
    for (entry, i) in history.iter().zip(3..=7) {
        assert_eq!(entry["user"], format!("question {i}"));
        assert_eq!(entry["assistant"], format!("reply to question {i}"));
    }

    // The seventh prompt carried exactly the five turns before it.
    let prompt = completion.last_prompt();
    assert!(!prompt.contains("User: question 1\n"));
    assert!(prompt.contains("User: question 2\nAssistant: reply to question 2"));
    assert!(prompt.contains("User: question 6\nAssistant: reply to question 6"));
}

#[tokio::test]
async fn e2e_failing_search_still_answers() {
    let completion = RecordingCompletion::new();
    let search = WebSearch::new(Arc::new(FailingSearch), "SAP", 3);
    let app = build_app(
        &AppConfig::default(),
        completion.clone(),
        search,
        KnowledgeBase::default(),
    );

    let (status, body) = chat(&app, "s1", "What is SAP HANA?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "reply to What is SAP HANA?");
    let prompt = completion.last_prompt();
    assert!(prompt.contains("WEB SEARCH RESULTS:\n\n\nIMPORTANT INSTRUCTIONS:"));
    assert!(!prompt.contains(NO_RESULTS));
}

#[tokio::test]
async fn e2e_search_results_reach_prompt() {
    let completion = RecordingCompletion::new();
    let app = default_app(completion.clone());

    chat(&app, "s1", "what is btp").await;
    let prompt = completion.last_prompt();
    assert!(prompt.contains("Here's what I found from recent web searches:"));
    assert!(prompt.contains(
        "1. SAP BTP overview\n   SAP Business Technology Platform unifies data and AI."
    ));
}

#[tokio::test]
async fn e2e_knowledge_directory_reaches_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("02_fiori.txt"), "Fiori is the SAP design system.\n").unwrap();
    std::fs::write(dir.path().join("01_abap.txt"), "ABAP is SAP's programming language.").unwrap();

    let knowledge = KnowledgeBase::load(dir.path(), &["txt".to_string()]);
    let completion = RecordingCompletion::new();
    let app = build_app(
        &AppConfig::default(),
        completion.clone(),
        WebSearch::disabled(),
        knowledge,
    );

    chat(&app, "kb", "What is ABAP?").await;
    assert!(completion.last_prompt().contains(
        "KNOWLEDGE BASE:\nABAP is SAP's programming language.\n\nFiori is the SAP design system.\n\nWEB SEARCH RESULTS:"
    ));
}

#[tokio::test]
async fn e2e_config_file_drives_persona() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[assistant]
domain = "Kubernetes"
name = "Kube Helper"

[session]
max_history = 2

[search]
enabled = false
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let completion = RecordingCompletion::new();
    let search = WebSearch::from_config(&config).unwrap();
    assert!(!search.is_enabled());
    let app = build_app(&config, completion.clone(), search, KnowledgeBase::default());

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Kube Helper API is running");

    for i in 0..3 {
        chat(&app, "k", &format!("pods {i}")).await;
    }
    assert_eq!(history(&app, "k").await.len(), 2);
    assert!(completion.last_prompt().contains("specialized in Kubernetes"));
}

#[tokio::test]
async fn e2e_concurrent_turns_on_one_session_are_not_lost() {
    let completion = RecordingCompletion::new();
    let app = default_app(completion.clone());

    let mut handles = Vec::new();
    for i in 0..4 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            chat(&app, "shared", &format!("parallel {i}")).await
        }));
    }
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(completion.calls(), 4);
    let history = history(&app, "shared").await;
    assert_eq!(history.len(), 4);
    for i in 0..4 {
        let expected = format!("parallel {i}");
        assert_eq!(history.iter().filter(|e| e["user"] == expected.as_str()).count(), 1);
    }
}

#[tokio::test]
async fn e2e_separate_sessions_do_not_share_history() {
    let completion = RecordingCompletion::new();
    let app = default_app(completion.clone());

    chat(&app, "alice", "about MM").await;
    chat(&app, "bob", "about SD").await;

    assert!(!completion.last_prompt().contains("about MM"));
    assert_eq!(history(&app, "alice").await.len(), 1);
    assert_eq!(history(&app, "bob").await.len(), 1);
}
