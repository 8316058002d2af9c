//! Tests for ChatClient against a mocked upstream.

use super::*;
use mockito::Matcher;
use serde_json::json;

fn client_for(server: &mockito::Server, key: Option<&str>) -> ChatClient {
    ChatClient::new(Client::new(), format!("{}/v1", server.url()), "gpt-4o")
        .with_api_key(key.map(str::to_string))
}

#[tokio::test]
async fn sends_bearer_key_model_and_json_format() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"products\":[]}"}}],
                "usage": {"prompt_tokens": 900, "completion_tokens": 12, "total_tokens": 912}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server, Some("sk-test"));
    let completion = client
        .complete(vec![ChatMessage::system("sys"), ChatMessage::user("hello")])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(completion.content, "{\"products\":[]}");
    assert_eq!(completion.usage.map(|u| u.total_tokens), Some(912));
}

#[tokio::test]
async fn missing_key_fails_without_calling_upstream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let result = client.complete(vec![ChatMessage::user("hello")]).await;

    mock.assert_async().await;
    assert_eq!(result.unwrap_err(), RelayError::ApiKeyMissing);
}

#[tokio::test]
async fn upstream_error_keeps_status_and_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("sk-bad"));
    let result = client.complete(vec![ChatMessage::user("hello")]).await;

    mock.assert_async().await;
    assert_eq!(
        result.unwrap_err(),
        RelayError::Upstream {
            status: 401,
            message: "Incorrect API key provided".to_string()
        }
    );
}

#[tokio::test]
async fn upstream_error_without_json_uses_generic_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .with_body("<html>Service Unavailable</html>")
        .create_async()
        .await;

    let client = client_for(&server, Some("sk-test"));
    let err = client.complete(vec![ChatMessage::user("hello")]).await.unwrap_err();

    assert_eq!(err.status_code().as_u16(), 503);
    assert_eq!(err.to_string(), GENERIC_UPSTREAM_ERROR);
}

#[tokio::test]
async fn empty_choices_is_a_parse_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices":[]}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("sk-test"));
    let err = client.complete(vec![ChatMessage::user("hello")]).await.unwrap_err();

    assert!(matches!(err, RelayError::Parse(_)));
}

#[tokio::test]
async fn unreachable_upstream_is_a_request_error() {
    // Port 9 (discard) is closed on test machines.
    let client = ChatClient::new(Client::new(), "http://127.0.0.1:9/v1", "gpt-4o")
        .with_api_key(Some("sk-test".to_string()));

    let err = client.complete(vec![ChatMessage::user("hello")]).await.unwrap_err();

    assert!(matches!(err, RelayError::Request(_)));
    assert_eq!(err.status_code().as_u16(), 500);
}

#[test]
fn completions_url_tolerates_trailing_slash() {
    let client = ChatClient::new(Client::new(), "https://api.openai.com/v1/", "gpt-4o");
    assert_eq!(
        client.completions_url(),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn blank_key_leaves_client_unconfigured() {
    let client = ChatClient::new(Client::new(), "https://api.openai.com/v1", "gpt-4o")
        .with_api_key(Some("".to_string()));
    assert!(!client.is_configured());
}

#[test]
fn error_message_extraction_reads_nested_message() {
    assert_eq!(
        upstream_error_message(r#"{"error":{"message":"quota exceeded"}}"#),
        "quota exceeded"
    );
    assert_eq!(upstream_error_message(r#"{"error":null}"#), GENERIC_UPSTREAM_ERROR);
    assert_eq!(upstream_error_message("not json"), GENERIC_UPSTREAM_ERROR);
}
