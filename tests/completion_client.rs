//! OpenAiClient behavior against a mock chat-completions endpoint.

use serde_json::json;
use sicha::{CompletionClient, CompletionRequest, OpenAiClient, Turn};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-4o".to_string(),
        messages: vec![
            Turn {
                role: "system".to_string(),
                content: "אתה עוזר מועיל".to_string(),
            },
            Turn {
                role: "user".to_string(),
                content: "שלום".to_string(),
            },
        ],
        temperature: 0.7,
        max_tokens: 128,
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn complete_returns_assistant_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "temperature": 0.7,
            "max_tokens": 128,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("שלום לך")))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test-key".to_string(), mock_server.uri());
    let content = client.complete(request()).await.unwrap();

    assert_eq!(content, "שלום לך");
}

#[tokio::test]
async fn complete_sends_history_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "אתה עוזר מועיל" },
                { "role": "user", "content": "שלום" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test-key".to_string(), mock_server.uri());
    client.complete(request()).await.unwrap();
}

#[tokio::test]
async fn complete_retries_transient_server_errors() {
    let mock_server = MockServer::start().await;

    // First attempt fails, the retry succeeds
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test-key".to_string(), mock_server.uri());
    let content = client.complete(request()).await.unwrap();

    assert_eq!(content, "recovered");
}

#[tokio::test]
async fn complete_fails_after_exhausting_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test-key".to_string(), mock_server.uri());
    let err = client.complete(request()).await.unwrap_err();

    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn empty_choices_yield_empty_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test-key".to_string(), mock_server.uri());
    let content = client.complete(request()).await.unwrap();

    assert_eq!(content, "");
}
