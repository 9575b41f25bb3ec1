//! Sequential batch runs, pause/resume, and provider comparison.

mod recognition_helpers;

use std::time::Duration;

use recognition_helpers::*;
use vision_relay_lib::batch::{compare_providers, BatchRunner};
use vision_relay_lib::config::ProviderConfig;
use vision_relay_lib::error::RecognitionError;
use vision_relay_lib::llm::provider::ProviderTag;
use vision_relay_lib::llm::types::{Category, RecognitionRequest};
use vision_relay_lib::pipeline::Recognizer;

fn table_requests(count: usize) -> Vec<RecognitionRequest> {
    (0..count)
        .map(|i| {
            RecognitionRequest::new(
                png_image(64).with_source_name(format!("page-{}.png", i)),
                Category::Table,
            )
        })
        .collect()
}

fn gemini_config() -> ProviderConfig {
    ProviderConfig::new("", "k").with_provider(ProviderTag::Gemini)
}

#[tokio::test(start_paused = true)]
async fn items_run_in_order_with_delay() {
    let transport = ScriptedTransport::always(200, gemini_reply(TABLE_TEXT));
    let recognizer = Recognizer::builder(transport.clone()).build();
    let runner = BatchRunner::new(Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    let mut seen = Vec::new();
    let outcomes = runner
        .run_with(&recognizer, &table_requests(3), &gemini_config(), |o| {
            seen.push(o.index)
        })
        .await;

    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[2].source_name.as_deref(), Some("page-2.png"));
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert_eq!(transport.request_count(), 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn failed_item_does_not_stop_batch() {
    let transport = ScriptedTransport::new(|_, index| {
        if index == 1 {
            status(500, "backend exploded")
        } else {
            ok(gemini_reply(TABLE_TEXT))
        }
    });
    let recognizer = Recognizer::builder(transport.clone()).build();
    let runner = BatchRunner::new(Duration::from_millis(10));

    let outcomes = runner
        .run(&recognizer, &table_requests(3), &gemini_config())
        .await;

    assert!(outcomes[0].result.is_ok());
    match &outcomes[1].result {
        Err(RecognitionError::ProviderRejection { status, .. }) => assert_eq!(*status, 500),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(outcomes[2].result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn paused_batch_waits_for_resume() {
    let transport = ScriptedTransport::always(200, gemini_reply(TABLE_TEXT));
    let recognizer = Recognizer::builder(transport.clone()).build();
    let runner = BatchRunner::new(Duration::from_secs(1));
    let handle = runner.pause_handle();
    handle.pause();

    let requests = table_requests(3);
    let config = gemini_config();
    let controller = async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.request_count(), 0, "nothing runs while paused");
        handle.resume();
    };
    let (outcomes, ()) = tokio::join!(runner.run(&recognizer, &requests, &config), controller);

    assert!(!handle.is_paused());
    assert_eq!(outcomes.len(), 3);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn compare_runs_each_provider() {
    let transport = ScriptedTransport::new(|req, _| {
        if req.url.contains("googleapis") {
            ok(gemini_reply(TABLE_TEXT))
        } else {
            ok(openai_reply(TABLE_TEXT))
        }
    });
    let recognizer = Recognizer::builder(transport.clone()).build();
    let request = RecognitionRequest::new(png_image(64), Category::Table);
    let configs = [
        gemini_config(),
        ProviderConfig::new("", "k").with_provider(ProviderTag::OpenAi),
    ];

    let comparisons =
        compare_providers(&recognizer, &request, &configs, Duration::from_secs(1)).await;

    let names: Vec<_> = comparisons.iter().map(|c| c.provider.as_str()).collect();
    assert_eq!(names, vec!["gemini", "openai"]);
    for comparison in &comparisons {
        let result = comparison.result.as_ref().unwrap();
        assert!(result.content.contains("Pens"));
    }
    let requests = transport.requests();
    assert!(requests[0].url.contains("generativelanguage.googleapis.com"));
    assert_eq!(requests[1].url, "https://api.openai.com/v1/chat/completions");
}

#[tokio::test]
async fn compare_labels_failures_by_config() {
    let transport = ScriptedTransport::always(401, "{\"error\": {\"message\": \"bad key\"}}");
    let recognizer = Recognizer::builder(transport).build();
    let request = RecognitionRequest::new(png_image(64), Category::Table);
    let configs = [ProviderConfig::new("", "k").with_provider(ProviderTag::DeepSeek)];

    let comparisons = compare_providers(&recognizer, &request, &configs, Duration::ZERO).await;
    assert_eq!(comparisons[0].provider, "deepseek");
    assert!(comparisons[0].result.is_err());
}
