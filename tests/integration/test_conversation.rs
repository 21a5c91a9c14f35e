//! End-to-end integration tests for the Barkeep client.
//!
//! Each test spins up an in-process mock of the recommendation service
//! and drives a real `Conversation` over a real `HttpSessionClient`,
//! with pacing shrunk to a millisecond so the timed steps finish
//! quickly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use barkeep_client::HttpSessionClient;
use barkeep_core::{
    Config, Conversation, ConversationPhase, ConversationSnapshot, DialogEntry, Pacing,
    RecommendationSource, SessionApi, TransportError,
};

const TEST_TOKEN: &str = "test-token";

// ============================================================================
// Mock recommendation service
// ============================================================================

#[derive(Default)]
struct MockService {
    questions: Mutex<VecDeque<Value>>,
    answers: Mutex<VecDeque<Value>>,
    received_answers: Mutex<Vec<String>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
    resets: AtomicUsize,
    sessions: AtomicUsize,
}

impl MockService {
    fn push_question(&self, question: Value) {
        self.questions.lock().unwrap().push_back(question);
    }

    fn push_answer(&self, answer: Value) {
        self.answers.lock().unwrap().push_back(answer);
    }

    fn add_image(&self, name: &str, bytes: &[u8]) {
        self.images
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
    }

    fn received_answers(&self) -> Vec<String> {
        self.received_answers.lock().unwrap().clone()
    }

    fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

fn token_ok(query: &HashMap<String, String>) -> bool {
    query.get("code").map(String::as_str) == Some(TEST_TOKEN)
}

async fn handle_start(
    State(mock): State<Arc<MockService>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
    }
    let id = mock.sessions.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({"user_id": format!("user-{id}")})))
}

async fn handle_question(
    State(mock): State<Arc<MockService>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
    }
    assert!(query.contains_key("user_id"), "question call missing user_id");
    match mock.questions.lock().unwrap().pop_front() {
        Some(question) => (StatusCode::OK, Json(question)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "no more questions"})),
        ),
    }
}

async fn handle_answer(
    State(mock): State<Arc<MockService>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
    }
    let answer = body["answer"].as_str().unwrap_or_default().to_string();
    mock.received_answers.lock().unwrap().push(answer);
    match mock.answers.lock().unwrap().pop_front() {
        Some(reply) => (StatusCode::OK, Json(reply)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "no scripted answer"})),
        ),
    }
}

async fn handle_reset(
    State(mock): State<Arc<MockService>>,
    Query(query): Query<HashMap<String, String>>,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
    }
    mock.resets.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn handle_image(
    State(mock): State<Arc<MockService>>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Vec<u8>) {
    if !token_ok(&query) {
        return (StatusCode::UNAUTHORIZED, Vec::new());
    }
    match mock.images.lock().unwrap().get(&name) {
        Some(bytes) => (StatusCode::OK, bytes.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

/// Serves the mock on an ephemeral port and returns its API base URL.
async fn spawn_mock(mock: Arc<MockService>) -> String {
    let router = Router::new()
        .route("/api/start", get(handle_start))
        .route("/api/question", get(handle_question))
        .route("/api/answer", post(handle_answer))
        .route("/api/reset", post(handle_reset))
        .route("/api/images/:name", get(handle_image))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Mock server failed");
    });
    format!("http://{addr}/api")
}

fn test_config(base_url: String) -> Config {
    Config {
        base_url,
        access_token: TEST_TOKEN.to_string(),
        request_timeout_secs: 5,
        pacing: Pacing {
            settle_ms: 1,
            pre_reveal_ms: 1,
            per_char_ms: 1,
            per_char_recommended_ms: 1,
        },
    }
}

async fn setup(mock: &Arc<MockService>) -> (Conversation<Arc<HttpSessionClient>>, Arc<HttpSessionClient>) {
    let base_url = spawn_mock(Arc::clone(mock)).await;
    let config = test_config(base_url);
    let client = Arc::new(HttpSessionClient::new(&config).expect("Failed to build client"));
    let conversation = Conversation::new(Arc::clone(&client), config.pacing);
    (conversation, client)
}

/// Polls snapshots until `pred` holds or a deadline passes.
async fn wait_until<F>(
    conversation: &Conversation<Arc<HttpSessionClient>>,
    mut pred: F,
) -> ConversationSnapshot
where
    F: FnMut(&ConversationSnapshot) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let snapshot = conversation.snapshot().await;
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for condition; phase={:?} entries={}",
            snapshot.phase,
            snapshot.entries.len()
        );
        sleep(Duration::from_millis(10)).await;
    }
}

fn single_question(text: &str, answers: &[&str]) -> Value {
    json!({"question": text, "answers": answers, "last": false, "multiple": false})
}

// ============================================================================
// Tests
// ============================================================================

/// Full happy path: opening pick, a multi-choice final question, and
/// the summary with both recommendations.
#[tokio::test]
async fn test_full_conversation_to_summary() {
    let mock = Arc::new(MockService::default());
    mock.push_question(single_question("What type of drink?", &["Beer", "Wine"]));
    mock.push_answer(json!({"response": "Nice pick."}));
    mock.push_question(json!({
        "question": "Pick three flavors",
        "answers": ["Fruity", "Spicy", "Oaked", "Earthy"],
        "last": true,
        "multiple": true,
        "requiredSelections": 3
    }));
    mock.push_answer(json!({
        "response": "Cheers!",
        "drink": {
            "Style_Name": "Hazy IPA",
            "description": "Juicy and soft",
            "flavor_profile": "citrus, tropical",
            "alcohol_content": 6.5,
            "Image_name": "hazy.png"
        },
        "systembolaget_drink": {
            "Style_Name": "Leva Riesling",
            "alcohol_content": 12.0
        }
    }));

    let (conversation, _client) = setup(&mock).await;
    conversation.start().await;
    wait_until(&conversation, |s| s.can_answer).await;

    conversation.toggle("Beer").await;
    assert!(conversation.submit().await);

    // Reveal runs, then the second question arrives and settles.
    wait_until(&conversation, |s| {
        s.can_answer && s.question.as_ref().is_some_and(|q| q.text == "Pick three flavors")
    })
    .await;

    conversation.toggle("Fruity").await;
    conversation.toggle("Spicy").await;
    conversation.toggle("Earthy").await;
    assert!(conversation.submit().await);

    let snapshot = wait_until(&conversation, |s| s.show_summary).await;
    assert_eq!(snapshot.phase, ConversationPhase::Summary);
    assert_eq!(snapshot.theme.as_deref(), Some("Beer"));
    assert_eq!(mock.received_answers(), ["Beer", "Fruity, Spicy, Earthy"]);

    // The opening pick is absent; the final answer is mirrored.
    let entries = &snapshot.entries;
    assert_eq!(entries[0], DialogEntry::question("What type of drink?"));
    assert_eq!(entries[1], DialogEntry::response("Nice pick."));
    assert_eq!(entries[2], DialogEntry::question("Pick three flavors"));
    assert_eq!(entries[3], DialogEntry::answer("Fruity, Spicy, Earthy"));
    assert_eq!(entries[4], DialogEntry::response("Cheers!"));
    let venue = &entries[5];
    let retail = &entries[6];
    assert!(matches!(
        venue,
        DialogEntry::Recommendation { source: RecommendationSource::Venue, payload }
            if payload.style_name == "Hazy IPA"
    ));
    assert!(matches!(
        retail,
        DialogEntry::Recommendation { source: RecommendationSource::Retail, payload }
            if payload.style_name == "Leva Riesling"
    ));
}

/// Resetting mid-conversation releases the session remotely, clears
/// everything locally, and a restart gets a fresh first question.
#[tokio::test]
async fn test_reset_mid_conversation() {
    let mock = Arc::new(MockService::default());
    mock.push_question(single_question("What type of drink?", &["Beer", "Wine"]));
    mock.push_question(single_question("What type of drink?", &["Beer", "Wine"]));

    let (conversation, _client) = setup(&mock).await;
    conversation.start().await;
    wait_until(&conversation, |s| s.can_answer).await;
    conversation.toggle("Wine").await;

    conversation.reset().await;
    let snapshot = conversation.snapshot().await;
    assert_eq!(snapshot.phase, ConversationPhase::NotStarted);
    assert!(snapshot.entries.is_empty());
    assert!(snapshot.selection.is_empty());
    assert_eq!(mock.reset_count(), 1);

    conversation.start().await;
    let snapshot = wait_until(&conversation, |s| s.can_answer).await;
    assert_eq!(snapshot.entries, [DialogEntry::question("What type of drink?")]);
    // The restart asked for a brand-new session.
    assert_eq!(mock.sessions.load(Ordering::SeqCst), 2);
}

/// A failing question fetch parks the conversation without corrupting
/// the ledger; a reset recovers it.
#[tokio::test]
async fn test_question_failure_parks_and_reset_recovers() {
    let mock = Arc::new(MockService::default());
    // No scripted question: the mock answers 500.

    let (conversation, _client) = setup(&mock).await;
    conversation.start().await;

    let snapshot = conversation.snapshot().await;
    assert_eq!(snapshot.phase, ConversationPhase::AwaitingQuestion);
    assert!(snapshot.entries.is_empty());

    mock.push_question(single_question("Back again?", &["Yes"]));
    conversation.reset().await;
    conversation.start().await;
    let snapshot = wait_until(&conversation, |s| s.can_answer).await;
    assert_eq!(snapshot.entries, [DialogEntry::question("Back again?")]);
}

/// Image bytes round-trip through the `images` endpoint, including a
/// name that needs percent-encoding.
#[tokio::test]
async fn test_fetch_image_roundtrip() {
    let mock = Arc::new(MockService::default());
    mock.add_image("hazy.png", b"png-bytes");
    mock.add_image("hazy ipa.png", b"spaced-bytes");

    let (_conversation, client) = setup(&mock).await;

    let bytes = client.fetch_image("hazy.png").await.expect("fetch failed");
    assert_eq!(bytes, b"png-bytes");

    let bytes = client
        .fetch_image("hazy ipa.png")
        .await
        .expect("encoded fetch failed");
    assert_eq!(bytes, b"spaced-bytes");

    let err = client.fetch_image("missing.png").await.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 404, .. }));
}

/// A wrong access token surfaces as a status error on the first call.
#[tokio::test]
async fn test_wrong_token_rejected() {
    let mock = Arc::new(MockService::default());
    let base_url = spawn_mock(Arc::clone(&mock)).await;
    let config = Config {
        access_token: "wrong".to_string(),
        ..test_config(base_url)
    };
    let client = HttpSessionClient::new(&config).expect("Failed to build client");

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 401, .. }));
}
