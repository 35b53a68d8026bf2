//! Commands in, routed panel state out, against mock vendors.

use std::sync::Arc;

use parking_lot::Mutex;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ytx_agent::{DispatcherConfig, LlmProvider, RequestDispatcher};
use ytx_channels::{
    Command, GenerateArgs, MessageBridge, MpscSink, PanelOutcome, PanelRequestContext,
    PanelRouter, ProviderSettings,
};
use ytx_extract::StructuredPayload;

fn gemini_line(text: &str) -> String {
    let payload = serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]});
    format!("data: {payload}\n\n")
}

fn sse(lines: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(lines.concat().into_bytes(), "text/event-stream")
}

fn generate(content: &str, key: &str) -> GenerateArgs {
    GenerateArgs {
        content: content.into(),
        prompt_template: None,
        settings: ProviderSettings {
            provider: LlmProvider::Gemini,
            api_key: key.into(),
            model: None,
        },
    }
}

#[tokio::test]
async fn concurrent_features_do_not_cross_talk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(body_string_contains("flashcards"))
        .respond_with(sse(&[
            gemini_line("```json\n[{\"front\":\"What is Rust?\","),
            gemini_line("\"back\":\"A language\",\"time\":\"0:05\"}]\n```"),
        ]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .and(body_string_contains("Summarize"))
        .respond_with(sse(&[gemini_line("A short "), gemini_line("summary.")]))
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::new(
        DispatcherConfig::default().with_base_url(LlmProvider::Gemini, server.uri()),
    );
    let (sink, mut inbox) = MpscSink::channel("panel");
    let bridge = MessageBridge::new(dispatcher, Arc::new(sink));

    let router = PanelRouter::new();
    let summarize = Command::Summarize(generate("[0:05] Rust is a language", "k"));
    let cards = Command::GenerateCards(generate("[0:05] Rust is a language", "k"));
    let summary_ctx = Arc::new(Mutex::new(PanelRequestContext::for_command(&summarize)));
    let cards_ctx = Arc::new(Mutex::new(PanelRequestContext::for_command(&cards)));
    router.register("SUMMARY", summary_ctx.clone());
    router.register("CARDS", cards_ctx.clone());

    let handles = vec![bridge.submit(summarize), bridge.submit(cards)];
    drop(bridge);
    for h in handles {
        h.await.unwrap();
    }
    while let Ok(raw) = inbox.try_recv() {
        router.route_json(&raw);
    }

    assert_eq!(
        summary_ctx.lock().outcome(),
        &PanelOutcome::Text("A short summary.".into())
    );
    match cards_ctx.lock().outcome() {
        PanelOutcome::Structured(StructuredPayload::Cards(cards)) => {
            assert_eq!(cards.len(), 1);
            assert_eq!(cards[0].front, "What is Rust?");
            assert_eq!(cards[0].time, "0:05");
        }
        other => panic!("Expected Cards, got {other:?}"),
    }
    assert_eq!(
        router.last_model(),
        Some(("gemini".to_string(), "gemini-2.5-flash".to_string()))
    );
}

#[tokio::test]
async fn missing_key_reaches_the_panel_as_error() {
    let dispatcher = RequestDispatcher::new(DispatcherConfig::default());
    let (sink, mut inbox) = MpscSink::channel("panel");
    let bridge = MessageBridge::new(dispatcher, Arc::new(sink));

    let raw = r#"{"type":"GENERATE_VOCAB","content":"[0:01] hi","settings":{"provider":"openai","apiKey":""}}"#;
    bridge.submit_json(raw).unwrap().await.unwrap();

    let router = PanelRouter::new();
    let ctx = Arc::new(Mutex::new(PanelRequestContext::new("VOCAB", None)));
    router.register("VOCAB", ctx.clone());
    while let Ok(raw) = inbox.try_recv() {
        router.route_json(&raw);
    }

    match ctx.lock().outcome() {
        PanelOutcome::Failed(msg) => assert!(msg.contains("API key")),
        other => panic!("Expected Failed, got {other:?}"),
    };
}

#[tokio::test]
async fn bad_command_json_is_rejected() {
    let dispatcher = RequestDispatcher::new(DispatcherConfig::default());
    let (sink, _inbox) = MpscSink::channel("panel");
    let bridge = MessageBridge::new(dispatcher, Arc::new(sink));
    assert!(bridge.submit_json(r#"{"type":"LAUNCH_ROCKET"}"#).is_err());
}
