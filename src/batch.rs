//! Batch recognition and provider comparison.
//!
//! Both run strictly one request at a time with a fixed delay in between;
//! providers rate-limit aggressively and throughput is not the goal.
//! Pausing is cooperative: the flag is checked before each item starts, so
//! an in-flight call always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::config::ProviderConfig;
use crate::error::RecognitionError;
use crate::llm::types::{RecognitionRequest, RecognitionResult};
use crate::pipeline::Recognizer;

#[derive(Default)]
struct PauseState {
    paused: AtomicBool,
    resumed: Notify,
}

/// Cloneable pause/resume switch shared with whoever controls the batch.
#[derive(Clone, Default)]
pub struct PauseHandle {
    inner: Arc<PauseState>,
}

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        log::info!("[BATCH] Paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.resumed.notify_waiters();
        log::info!("[BATCH] Resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Returns immediately unless paused; otherwise waits for `resume`.
    pub async fn wait_while_paused(&self) {
        loop {
            // Register before checking so a resume in between is not lost.
            let resumed = self.inner.resumed.notified();
            if !self.is_paused() {
                return;
            }
            resumed.await;
        }
    }
}

#[derive(Debug)]
pub struct BatchItemOutcome {
    pub index: usize,
    pub source_name: Option<String>,
    pub result: Result<RecognitionResult, RecognitionError>,
}

pub struct BatchRunner {
    delay: Duration,
    pause: PauseHandle,
}

impl BatchRunner {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pause: PauseHandle::new(),
        }
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    pub async fn run(
        &self,
        recognizer: &Recognizer,
        requests: &[RecognitionRequest],
        config: &ProviderConfig,
    ) -> Vec<BatchItemOutcome> {
        self.run_with(recognizer, requests, config, |_| {}).await
    }

    /// Like `run`, reporting each outcome as soon as it is known.
    pub async fn run_with(
        &self,
        recognizer: &Recognizer,
        requests: &[RecognitionRequest],
        config: &ProviderConfig,
        mut on_item: impl FnMut(&BatchItemOutcome),
    ) -> Vec<BatchItemOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.delay).await;
            }
            self.pause.wait_while_paused().await;

            log::info!("[BATCH] Item {}/{}", index + 1, requests.len());
            let result = recognizer.recognize(request, config).await;
            if let Err(e) = &result {
                log::warn!("[BATCH] Item {} failed: {}", index + 1, e);
            }

            let outcome = BatchItemOutcome {
                index,
                source_name: request.image.source_name.clone(),
                result,
            };
            on_item(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[derive(Debug)]
pub struct ProviderComparison {
    pub provider: String,
    pub elapsed: Duration,
    pub result: Result<RecognitionResult, RecognitionError>,
}

fn provider_label(config: &ProviderConfig) -> String {
    match (config.declared_provider, config.api_endpoint.trim()) {
        (Some(tag), _) => tag.to_string(),
        (None, "") => config.model.clone(),
        (None, endpoint) => endpoint.to_string(),
    }
}

/// Run the same request against each provider, one after another.
pub async fn compare_providers(
    recognizer: &Recognizer,
    request: &RecognitionRequest,
    configs: &[ProviderConfig],
    delay: Duration,
) -> Vec<ProviderComparison> {
    let mut comparisons = Vec::with_capacity(configs.len());

    for (index, config) in configs.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(delay).await;
        }
        let start = Instant::now();
        let result = recognizer.recognize(request, config).await;
        let provider = match &result {
            Ok(r) => r.provider_used.clone(),
            Err(_) => provider_label(config),
        };
        log::info!(
            "[BATCH] Compared {} in {}ms ({})",
            provider,
            start.elapsed().as_millis(),
            if result.is_ok() { "ok" } else { "failed" }
        );
        comparisons.push(ProviderComparison {
            provider,
            elapsed: start.elapsed(),
            result,
        });
    }
    comparisons
}
