use pullcheck_ai::{Analyzer, OpenAiAnalyzer};
use pullcheck_core::config::OpenAiConfig;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn config(api_base: String) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-key".to_string(),
        api_base,
        model: "gpt-4o-mini".to_string(),
    }
}

fn completion_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 0,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
    }))
}

#[tokio::test]
async fn analyze_sends_model_and_key_and_parses_issues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(completion_response(
            r#"{"issues": [{"type": "bug", "line": 2, "description": "off by one"}]}"#,
        ))
        .mount(&server)
        .await;

    let analyzer = OpenAiAnalyzer::new(&config(server.uri())).unwrap();
    let issues = analyzer
        .analyze("main.py", "print(1)", Some("diff --git a/main.py b/main.py"))
        .await
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "bug");
    assert_eq!(issues[0].line, Some(2));
}

#[tokio::test]
async fn analyze_reports_empty_choices_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o-mini",
            "choices": [],
        })))
        .mount(&server)
        .await;

    let analyzer = OpenAiAnalyzer::new(&config(server.uri())).unwrap();
    let err = analyzer.analyze("main.py", "print(1)", None).await.unwrap_err();
    assert!(err.to_string().contains("empty response"), "{err}");
}
