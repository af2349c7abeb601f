use boardchat::config::ChatConfig;
use boardchat::prompt::context_offset;
use boardchat::secret_store::{SecretStore, BOARD_API_KEY};
use boardchat::session::{ChatSession, INSUFFICIENT_DATA, KEYS_EXHAUSTED, WARMING_UP};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANSWER: &str = "Install pumps is the most urgent task.";

fn boards_payload(items: usize) -> serde_json::Value {
    let items: Vec<_> = (0..items)
        .map(|i| {
            let status = if i % 2 == 0 { "Stuck" } else { "" };
            json!({"name": format!("Work order {i}"), "column_values": [
                {"text": status, "column": {"title": "Status"}},
                {"text": "", "column": {"title": "Owner"}}
            ]})
        })
        .collect();
    json!({"data": {"boards": [{"name": "Work Orders", "items_page": {"items": items}}]}})
}

async fn mount_boards(server: &MockServer, payload: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(server)
        .await;
}

async fn mount_chat(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": ANSWER}}]
        })))
        .mount(server)
        .await;

    let mut sse = String::new();
    for fragment in ["Install pumps ", "is the most ", "urgent task."] {
        let frame = json!({"choices": [{"delta": {"content": fragment}}]});
        sse.push_str(&format!("data: {frame}\n\n"));
    }
    sse.push_str("data: [DONE]\n\n");
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ChatConfig {
    ChatConfig {
        board_api_url: format!("{}/v2", server.uri()),
        base_url: Some(format!("{}/v1", server.uri())),
        backend: "groq".into(),
        board_timeout_seconds: 5,
        llm_timeout_seconds: 5,
        ..ChatConfig::default()
    }
}

fn new_session(config: &ChatConfig, keys: &[&str]) -> ChatSession {
    ChatSession::new(
        Box::new(config.board_fetcher("board-key").unwrap()),
        config.assembler(),
        config.llm(keys.iter().copied()).unwrap(),
    )
}

async fn chat_requests(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v1/chat/completions")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_empty_boards_make_no_model_call() {
    let server = MockServer::start().await;
    mount_boards(&server, json!({"data": {"boards": []}})).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = new_session(&config(&server), &["k1"]);
    assert_eq!(session.ask("What is stuck?").await, INSUFFICIENT_DATA);
    assert_eq!(session.ask_streaming("And now?", |_| {}).await, INSUFFICIENT_DATA);
}

#[tokio::test]
async fn test_context_is_cut_to_configured_cap() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(40)).await;
    mount_chat(&server).await;

    let config = ChatConfig {
        max_context_chars: 250,
        ..config(&server)
    };
    let full_context = {
        let mut fetcher = config.board_fetcher("board-key").unwrap();
        fetcher.try_context().await.unwrap()
    };
    assert!(full_context.chars().count() > 250);

    let mut session = new_session(&config, &["k1"]);
    assert_eq!(session.ask("What is stuck?").await, ANSWER);

    let requests = chat_requests(&server).await;
    let system = requests[0]["messages"][0]["content"].as_str().unwrap();
    let embedded = &system[context_offset()..];
    let expected: String = full_context.chars().take(250).collect();
    assert_eq!(embedded, expected);
}

#[tokio::test]
async fn test_streamed_answer_equals_blocking_answer() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    mount_chat(&server).await;

    let mut session = new_session(&config(&server), &["k1"]);
    let blocking = session.ask("What is urgent?").await;

    let mut fragments = Vec::new();
    let streamed = session
        .ask_streaming("What is urgent?", |f| fragments.push(f.to_string()))
        .await;
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments.concat(), streamed);
    assert_eq!(streamed, blocking);
}

#[tokio::test]
async fn test_history_replay_is_bounded() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    mount_chat(&server).await;

    let mut session = new_session(&config(&server), &["k1"]);
    for i in 0..10 {
        session.ask(&format!("question {i}")).await;
    }
    assert_eq!(session.history().await.len(), 20);

    let requests = chat_requests(&server).await;
    let last = requests.last().unwrap()["messages"].as_array().unwrap().clone();
    // system, 4 replayed messages, question
    assert_eq!(last.len(), 6);
    assert_eq!(last[1]["content"], "question 8");
    assert_eq!(last[2]["content"], ANSWER);
    assert_eq!(last[5]["content"], "question 9");
    assert!(last[1..]
        .iter()
        .all(|m| !m["content"].as_str().unwrap().contains("Board: Work Orders")));
}

#[tokio::test]
async fn test_all_keys_failing_yields_exhaustion_message() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let mut session = new_session(&config(&server), &["k1", "k2", "k3"]);
    assert_eq!(session.ask("What is stuck?").await, KEYS_EXHAUSTED);
}

#[tokio::test]
async fn test_single_key_status_error_is_reported() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut session = new_session(&config(&server), &["k1"]);
    assert_eq!(session.ask("What is stuck?").await, "AI error: 403");
}

#[tokio::test]
async fn test_loading_model_yields_warming_up_message() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = ChatConfig {
        backend: "hf-inference".into(),
        base_url: Some(format!("{}/models/test-model", server.uri())),
        warmup_delay_seconds: 0,
        ..config(&server)
    };
    let mut session = new_session(&config, &["hf-key"]);
    assert_eq!(session.ask("What is stuck?").await, WARMING_UP);
}

#[tokio::test]
async fn test_session_from_secret_store() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    mount_chat(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut secrets = SecretStore::with_path(dir.path().join("secrets.json"))
        .unwrap()
        .without_env();
    secrets.set(BOARD_API_KEY, "board-key").unwrap();
    secrets.set("GROQ_API_KEY_1", "k1").unwrap();
    secrets.set("GROQ_API_KEY_2", "k2").unwrap();

    let mut session = config(&server).session(&secrets).unwrap();
    assert_eq!(session.answer("What is urgent?", |_| {}).await, ANSWER);
}

#[tokio::test]
async fn test_stream_without_text_yields_error_answer() {
    let server = MockServer::start().await;
    mount_boards(&server, boards_payload(3)).await;
    let sse = format!(
        "data: {}\n\ndata: [DONE]\n\n",
        json!({"error": {"message": "model overloaded"}})
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = new_session(&config(&server), &["k1"]);
    let answer = session.ask_streaming("What is stuck?", |_| {}).await;
    assert!(answer.starts_with("AI error:"), "unexpected answer {answer:?}");

    let history = session.history().await;
    assert_eq!(history.len(), 2);
    assert!(!history[1].content.is_empty());
}
