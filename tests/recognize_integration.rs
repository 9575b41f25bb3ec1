//! End-to-end recognition through `Recognizer` with a scripted transport.
//!
//! Covers the dialect path, the classification gate, post-analysis
//! dispatch, negotiation against self-hosted relays and error mapping.

mod recognition_helpers;

use std::sync::Arc;

use async_trait::async_trait;
use recognition_helpers::*;
use vision_relay_lib::analysis::{
    AnalysisKind, AnalysisResult, Analyzer, AnalyzerError, AnalyzerSet,
};
use vision_relay_lib::config::ProviderConfig;
use vision_relay_lib::error::RecognitionError;
use vision_relay_lib::history::MemoryHistory;
use vision_relay_lib::llm::prompts;
use vision_relay_lib::llm::provider::ProviderTag;
use vision_relay_lib::llm::types::{Category, RecognitionRequest};
use vision_relay_lib::pipeline::Recognizer;

fn gemini_config() -> ProviderConfig {
    ProviderConfig::new("gemini-2.0-flash", "test-key").with_provider(ProviderTag::Gemini)
}

fn max_output_tokens(transport: &ScriptedTransport, index: usize) -> u64 {
    transport.requests()[index].body.as_ref().unwrap()["generationConfig"]["maxOutputTokens"]
        .as_u64()
        .unwrap()
}

// ── Scenario 1: explicit table category ─────────────────────────────

#[tokio::test]
async fn table_category_uses_table_budget_and_table_analysis() {
    let transport = ScriptedTransport::new(|_, _| ok(gemini_reply(TABLE_TEXT)));
    let recognizer = Recognizer::builder(transport.clone()).build();

    let request = RecognitionRequest::new(png_image(2048), Category::Table);
    let result = recognizer.recognize(&request, &gemini_config()).await.unwrap();

    assert_eq!(transport.request_count(), 1, "no classification for explicit category");
    assert_eq!(max_output_tokens(&transport, 0), 16384);
    assert!(transport.requests()[0].url.contains("key=test-key"));
    assert_eq!(result.content, TABLE_TEXT);
    assert!(result.classification.is_none());
    match result.special_analysis {
        Some(AnalysisResult::Table(table)) => {
            assert_eq!(table.headers, vec!["Item", "Qty"]);
            assert_eq!(table.rows.len(), 2);
        }
        other => panic!("expected table analysis, got {:?}", other),
    }
}

// ── Scenario 2: auto category classified as receipt ─────────────────

#[tokio::test]
async fn auto_category_classifies_then_analyzes_receipt() {
    let transport = ScriptedTransport::new(|req, _| {
        if is_taxonomy_call(req) {
            ok(gemini_reply("receipt"))
        } else if is_confidence_call(req) {
            ok(gemini_reply("85|itemized prices and a total"))
        } else {
            ok(gemini_reply(RECEIPT_TEXT))
        }
    });
    let recognizer = Recognizer::builder(transport.clone()).build();

    let request = RecognitionRequest::new(png_image(2048), Category::Auto);
    let result = recognizer.recognize(&request, &gemini_config()).await.unwrap();

    let classification = result.classification.expect("classification present");
    assert_eq!(classification.detected_type, Category::Receipt);
    assert_eq!(classification.confidence, 85);
    assert_eq!(classification.rationale, "itemized prices and a total");

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[2].body.as_ref().unwrap()["contents"][0]["parts"][0]["text"],
        prompts::prompt_for(Category::Receipt)
    );
    assert_eq!(max_output_tokens(&transport, 2), 8192);

    match result.special_analysis {
        Some(AnalysisResult::Receipt(receipt)) => {
            assert_eq!(receipt.items.len(), 2);
            assert_eq!(receipt.total, Some(5.75));
        }
        other => panic!("expected receipt analysis, got {:?}", other),
    }
}

// ── Scenario 3: relay answering with a login page ───────────────────

fn login_page(total_chars: usize) -> String {
    let prefix = "<!DOCTYPE html><html><head><title>Sign in</title></head><body><form>";
    let suffix = "</form></body></html>";
    let filler = "x".repeat(total_chars - prefix.len() - suffix.len());
    format!("{}{}{}", prefix, filler, suffix)
}

#[tokio::test]
async fn html_from_every_candidate_exhausts_negotiation() {
    let page = login_page(2000);
    assert_eq!(page.chars().count(), 2000);
    let transport = ScriptedTransport::always(200, page);
    let recognizer = Recognizer::builder(transport.clone()).build();

    let config = ProviderConfig::new("llava", "k")
        .with_endpoint("https://relay.example/api/recognize")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(512), Category::Document);
    let err = recognizer.recognize(&request, &config).await.unwrap_err();

    match err {
        RecognitionError::NegotiationExhausted { attempts, last, .. } => {
            assert_eq!(attempts.len(), 15);
            assert!(last.contains("portal page (2000 chars)"), "last: {}", last);
        }
        other => panic!("expected NegotiationExhausted, got {:?}", other),
    }
    assert_eq!(transport.request_count(), 15);
}

#[tokio::test]
async fn html_behind_comment_bom_or_xml_prolog_exhausts_negotiation() {
    let page = format!(
        "<!DOCTYPE html><html><head><script>{}</script></head><body>Sign in</body></html>",
        "var gw = 1;".repeat(100)
    );
    let config = ProviderConfig::new("llava", "k")
        .with_endpoint("https://relay.example/api/recognize")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(512), Category::Document);

    for prefix in [
        "<!-- served by relay-gw -->\n",
        "\u{feff}",
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
    ] {
        let transport = ScriptedTransport::always(200, format!("{}{}", prefix, page));
        let err = Recognizer::builder(transport.clone())
            .build()
            .recognize(&request, &config)
            .await
            .unwrap_err();

        match err {
            RecognitionError::NegotiationExhausted { attempts, last, .. } => {
                assert_eq!(attempts.len(), 15, "prefix {:?}", prefix);
                assert!(last.contains("portal page"), "last: {}", last);
            }
            other => panic!("prefix {:?}: expected NegotiationExhausted, got {:?}", prefix, other),
        }
        assert_eq!(transport.request_count(), 15);
    }
}

#[tokio::test]
async fn html_content_type_is_never_accepted() {
    use vision_relay_lib::llm::transport::RawResponse;

    let transport = ScriptedTransport::new(|_, _| {
        Ok(RawResponse {
            content_type: Some("text/html".to_string()),
            ..RawResponse::new(200, "Session expired, please log in again")
        })
    });
    let config = ProviderConfig::new("llava", "k")
        .with_endpoint("https://relay.example/api/recognize")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(512), Category::Document);

    let err = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, RecognitionError::NegotiationExhausted { .. }));
    assert_eq!(transport.request_count(), 15);
}

// ── Scenario 4: rate limit vs. rejected credentials ─────────────────

#[tokio::test]
async fn rate_limit_is_retryable_unauthorized_is_not() {
    let config = ProviderConfig::new("gpt-4o-mini", "k").with_provider(ProviderTag::OpenAi);
    let request = RecognitionRequest::new(png_image(256), Category::Document);

    let limited = Recognizer::builder(ScriptedTransport::new(|_, _| status(429, "Rate limit reached")))
        .build()
        .recognize(&request, &config)
        .await
        .unwrap_err();
    assert!(limited.retryable());
    assert!(limited.is_rate_limited());
    assert_eq!(limited.status(), Some(429));
    assert!(limited.to_string().contains("rate"));
    assert!(limited.to_string().contains("Rate limit reached"));

    let rejected = Recognizer::builder(ScriptedTransport::new(|_, _| status(401, "Invalid API key")))
        .build()
        .recognize(&request, &config)
        .await
        .unwrap_err();
    assert!(!rejected.retryable());
    assert!(!rejected.is_rate_limited());
    assert!(rejected.to_string().contains("Invalid API key"));
}

// ── Scenario 5: failing analyzer never fails the recognition ────────

struct ExplodingIdAnalyzer;

#[async_trait]
impl Analyzer for ExplodingIdAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::IdDocument
    }

    async fn analyze(&self, _text: &str) -> Result<AnalysisResult, AnalyzerError> {
        Err(AnalyzerError::Failed("document model unavailable".into()))
    }
}

#[tokio::test]
async fn failing_id_analyzer_keeps_base_content() {
    let text = "NAME: JANE DOE\nNUMBER: X1234567";
    let transport = ScriptedTransport::new(move |_, _| ok(gemini_reply(text)));
    let recognizer = Recognizer::builder(transport)
        .analyzers(AnalyzerSet::builtin().with(ExplodingIdAnalyzer))
        .build();

    let request = RecognitionRequest::new(png_image(256), Category::Id);
    let result = recognizer.recognize(&request, &gemini_config()).await.unwrap();

    assert_eq!(result.content, text);
    assert!(result.special_analysis.is_none());
}

// ── Negotiation ─────────────────────────────────────────────────────

#[tokio::test]
async fn negotiated_candidate_is_pinned_for_the_rest_of_the_request() {
    let transport = ScriptedTransport::new(|req, _| {
        let accepted = req.url.ends_with("/v1/chat/completions") && req.header("x-api-key") == Some("secret");
        if !accepted {
            return status(401, "unauthorized");
        }
        if is_taxonomy_call(req) {
            ok(openai_reply("document"))
        } else if is_confidence_call(req) {
            ok(openai_reply("90|printed page"))
        } else {
            ok(openai_reply("Hello from the relay"))
        }
    });
    let recognizer = Recognizer::builder(transport.clone()).build();

    let config = ProviderConfig::new("llava-13b", "secret")
        .with_endpoint("https://relay.example/v1")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(256), Category::Auto);
    let result = recognizer.recognize(&request, &config).await.unwrap();

    assert_eq!(result.content, "Hello from the relay");
    assert_eq!(
        result.classification.as_ref().map(|c| c.detected_type),
        Some(Category::Document)
    );
    assert_eq!(result.provider_used, "self-hosted (openai-chat body + api-key header)");

    // 5 gemini attempts + bearer + google header + api-key header, then
    // one request each for the confidence and main calls.
    let requests = transport.requests();
    assert_eq!(requests.len(), 10);
    assert!(requests[0].url.ends_with("/v1/models/llava-13b:generateContent"));
    for pinned in &requests[7..] {
        assert!(pinned.url.ends_with("/v1/chat/completions"));
        assert_eq!(pinned.header("x-api-key"), Some("secret"));
        assert_eq!(pinned.body.as_ref().unwrap()["model"], "llava-13b");
    }
}

fn attempt_signature(transport: &ScriptedTransport) -> Vec<(String, Vec<(String, String)>)> {
    transport
        .requests()
        .into_iter()
        .map(|r| (r.url, r.headers))
        .collect()
}

#[tokio::test]
async fn negotiation_order_is_deterministic() {
    let config = ProviderConfig::new("m", "k")
        .with_endpoint("https://relay.example/v1")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(64), Category::Document);

    let first = ScriptedTransport::always(401, "{}");
    let second = ScriptedTransport::always(401, "{}");
    for transport in [&first, &second] {
        let err = Recognizer::builder(transport.clone())
            .build()
            .recognize(&request, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::NegotiationExhausted { .. }));
    }

    assert_eq!(attempt_signature(&first), attempt_signature(&second));
    let requests = first.requests();
    assert_eq!(requests.len(), 15);
    assert_eq!(requests[0].header("authorization"), Some("Bearer k"));
    assert_eq!(requests[1].header("x-goog-api-key"), Some("k"));
    assert_eq!(requests[2].header("x-api-key"), Some("k"));
    assert_eq!(requests[3].header("cookie"), Some("api_key=k"));
    assert!(requests[4].url.contains("key=k"));
    assert!(requests[5].url.ends_with("/v1/chat/completions"));
    assert_eq!(requests[10].url, "https://relay.example/v1");
    assert!(requests[10].body.as_ref().unwrap().get("prompt").is_some());
}

#[tokio::test]
async fn chat_completions_endpoint_tries_openai_body_first() {
    let transport = ScriptedTransport::new(|req, _| {
        if req.header("authorization") == Some("Bearer k") {
            ok(openai_reply("first try"))
        } else {
            status(401, "no")
        }
    });
    let config = ProviderConfig::new("m", "k")
        .with_endpoint("https://relay.example/v1/chat/completions")
        .self_hosted(true);
    let request = RecognitionRequest::new(png_image(64), Category::Document);
    let result = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &config)
        .await
        .unwrap();

    assert_eq!(result.content, "first try");
    assert_eq!(transport.request_count(), 1);
    assert!(transport.requests()[0].body.as_ref().unwrap().get("messages").is_some());
}

#[tokio::test]
async fn unknown_provider_without_endpoint_is_a_configuration_error() {
    let transport = ScriptedTransport::always(200, gemini_reply("unused"));
    let config = ProviderConfig::new("my-private-model", "k");
    let request = RecognitionRequest::new(png_image(64), Category::Document);
    let err = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RecognitionError::Configuration(_)));
    assert!(!err.retryable());
    assert_eq!(transport.request_count(), 0);
}

// ── Budgets, degradation, gate behavior ─────────────────────────────

#[tokio::test]
async fn large_image_threshold_is_inclusive() {
    let transport = ScriptedTransport::new(|_, _| ok(gemini_reply("text")));
    let recognizer = Recognizer::builder(transport.clone()).build();
    let config = gemini_config();

    for len in [500 * 1024 - 1, 500 * 1024] {
        let request = RecognitionRequest::new(png_image(len), Category::Document);
        recognizer.recognize(&request, &config).await.unwrap();
    }
    assert_eq!(max_output_tokens(&transport, 0), 8192);
    assert_eq!(max_output_tokens(&transport, 1), 12288);
}

#[tokio::test]
async fn identical_requests_give_identical_results() {
    let transport = ScriptedTransport::new(|req, _| {
        if is_taxonomy_call(req) {
            ok(gemini_reply("document"))
        } else if is_confidence_call(req) {
            ok(gemini_reply("77|clear"))
        } else {
            ok(gemini_reply("Same answer"))
        }
    });
    let recognizer = Recognizer::builder(transport).build();
    let request = RecognitionRequest::new(png_image(128), Category::Auto);

    let first = recognizer.recognize(&request, &gemini_config()).await.unwrap();
    let second = recognizer.recognize(&request, &gemini_config()).await.unwrap();
    assert_eq!(first.content, "Same answer");
    assert_eq!(first, second);
}

#[tokio::test]
async fn truncated_answer_is_a_low_confidence_success() {
    let body = serde_json::json!({
        "candidates": [
            { "content": { "parts": [ { "text": "Partial transcription" } ] }, "finishReason": "MAX_TOKENS" }
        ]
    })
    .to_string();
    let transport = ScriptedTransport::always(200, body);
    let request = RecognitionRequest::new(png_image(128), Category::Document);
    let result = Recognizer::builder(transport)
        .build()
        .recognize(&request, &gemini_config())
        .await
        .unwrap();

    assert_eq!(result.content, "Partial transcription");
    assert!((result.confidence - 0.3).abs() < f64::EPSILON);
    assert!(result.notice.is_some());
}

#[tokio::test]
async fn blocked_answer_carries_explanation_and_no_analysis() {
    let body = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
    let transport = ScriptedTransport::always(200, body);
    let request = RecognitionRequest::new(png_image(128), Category::Receipt);
    let result = Recognizer::builder(transport)
        .build()
        .recognize(&request, &gemini_config())
        .await
        .unwrap();

    assert!(result.content.contains("SAFETY"));
    assert!(result.special_analysis.is_none());
    assert!((result.confidence - 0.3).abs() < f64::EPSILON);
}

#[tokio::test]
async fn classification_failure_falls_back_to_default_prompt() {
    let transport = ScriptedTransport::new(|_, index| {
        if index == 0 {
            status(500, "overloaded")
        } else {
            ok(gemini_reply("plain text"))
        }
    });
    let request = RecognitionRequest::new(png_image(128), Category::Auto);
    let result = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &gemini_config())
        .await
        .unwrap();

    assert!(result.classification.is_none());
    assert_eq!(result.content, "plain text");
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].body.as_ref().unwrap()["contents"][0]["parts"][0]["text"],
        prompts::DEFAULT_PROMPT
    );
}

#[tokio::test]
async fn override_prompt_skips_classification() {
    let transport = ScriptedTransport::new(|_, _| ok(gemini_reply("Quarterly Report")));
    let request =
        RecognitionRequest::new(png_image(128), Category::Auto).with_prompt("Only the title");
    let result = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &gemini_config())
        .await
        .unwrap();

    assert!(result.classification.is_none());
    assert_eq!(transport.request_count(), 1);
    assert!(body_text(&transport.requests()[0]).contains("Only the title"));
}

#[tokio::test]
async fn code_fence_is_stripped_and_original_kept() {
    let raw = "```rust\nfn main() {}\n```";
    let transport = ScriptedTransport::new(move |_, _| ok(gemini_reply(raw)));
    let request = RecognitionRequest::new(png_image(128), Category::Code);
    let result = Recognizer::builder(transport)
        .build()
        .recognize(&request, &gemini_config())
        .await
        .unwrap();

    assert_eq!(result.content, "fn main() {}");
    assert_eq!(result.original_content.as_deref(), Some(raw));
}

#[tokio::test]
async fn completed_recognition_is_recorded_in_history() {
    let history = Arc::new(MemoryHistory::new());
    let transport = ScriptedTransport::new(|_, _| ok(gemini_reply("logged")));
    let recognizer = Recognizer::builder(transport)
        .history(history.clone())
        .build();

    let request = RecognitionRequest::new(png_image(300), Category::Document);
    recognizer.recognize(&request, &gemini_config()).await.unwrap();

    let entries = history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size_bytes, 300);
    assert_eq!(entries[0].source_name.as_deref(), Some("sample.png"));
    assert_eq!(entries[0].result.content, "logged");
}

#[tokio::test]
async fn deepseek_gets_the_slow_timeout() {
    let transport = ScriptedTransport::new(|_, _| ok(openai_reply("slow but fine")));
    let config = ProviderConfig::new("", "k").with_provider(ProviderTag::DeepSeek);
    let request = RecognitionRequest::new(png_image(64), Category::Document);
    let result = Recognizer::builder(transport.clone())
        .build()
        .recognize(&request, &config)
        .await
        .unwrap();

    assert_eq!(result.provider_used, "deepseek");
    let sent = &transport.requests()[0];
    assert_eq!(sent.timeout, std::time::Duration::from_secs(120));
    assert!(sent.url.starts_with("https://api.deepseek.com/v1/chat/completions"));
}
