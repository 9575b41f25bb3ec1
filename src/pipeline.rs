//! Recognition pipeline — the orchestration core.
//!
//! resolve dialect → (negotiate) → optional classification → main
//! recognition call → post-analysis → `RecognitionResult`.
//!
//! Everything a request touches is request-scoped. The recognizer itself
//! only holds immutable collaborators injected at construction, so one
//! instance can serve any number of sequential or concurrent requests.

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::AnalyzerSet;
use crate::config::{ProviderConfig, RecognizerOptions};
use crate::error::RecognitionError;
use crate::history::{HistoryEntry, HistorySink};
use crate::llm::classify;
use crate::llm::dialect::{model_or_default, AdapterRegistry, TokenBudget};
use crate::llm::envelope::clean_content;
use crate::llm::negotiate;
use crate::llm::probe::{self, ProbeOutcome};
use crate::llm::prompts;
use crate::llm::provider::{Dialect, Resolution, ResolverRules};
use crate::llm::session::{Completer, Route, Session};
use crate::llm::transport::{HttpTransport, Transport};
use crate::llm::types::{Category, RecognitionRequest, RecognitionResult};

pub struct Recognizer {
    transport: Arc<dyn Transport>,
    adapters: AdapterRegistry,
    rules: ResolverRules,
    analyzers: AnalyzerSet,
    history: Option<Arc<dyn HistorySink>>,
    options: RecognizerOptions,
}

/// Builder for `Recognizer`. Unset parts get the standard defaults.
pub struct RecognizerBuilder {
    transport: Arc<dyn Transport>,
    adapters: AdapterRegistry,
    rules: ResolverRules,
    analyzers: AnalyzerSet,
    history: Option<Arc<dyn HistorySink>>,
    options: RecognizerOptions,
}

impl RecognizerBuilder {
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn rules(mut self, rules: ResolverRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn analyzers(mut self, analyzers: AnalyzerSet) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn options(mut self, options: RecognizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Recognizer {
        Recognizer {
            transport: self.transport,
            adapters: self.adapters,
            rules: self.rules,
            analyzers: self.analyzers,
            history: self.history,
            options: self.options,
        }
    }
}

impl Recognizer {
    pub fn builder(transport: Arc<dyn Transport>) -> RecognizerBuilder {
        RecognizerBuilder {
            transport,
            adapters: AdapterRegistry::standard(),
            rules: ResolverRules::default(),
            analyzers: AnalyzerSet::builtin(),
            history: None,
            options: RecognizerOptions::default(),
        }
    }

    /// Standard recognizer over a real HTTP client.
    pub fn http() -> Self {
        Self::builder(Arc::new(HttpTransport::new())).build()
    }

    pub fn options(&self) -> &RecognizerOptions {
        &self.options
    }

    /// Pick the adapter or the negotiation candidate list for `config`.
    fn route(&self, config: &ProviderConfig) -> Result<(Route, Option<Dialect>), RecognitionError> {
        match self.rules.resolve(config) {
            Resolution::Known(dialect) => {
                let adapter = self.adapters.get(dialect).ok_or_else(|| {
                    RecognitionError::Configuration(format!(
                        "no adapter registered for {}",
                        dialect
                    ))
                })?;
                log::info!("[RESOLVE] Dialect: {}", dialect);
                Ok((Route::Adapter(adapter), Some(dialect)))
            }
            Resolution::SelfHostedUnknown => {
                if config.api_endpoint.trim().is_empty() {
                    return Err(RecognitionError::Configuration(
                        "provider could not be identified and no API endpoint is configured"
                            .to_string(),
                    ));
                }
                let candidates = negotiate::candidate_order(config);
                log::info!(
                    "[RESOLVE] Self-hosted endpoint, {} candidates to negotiate",
                    candidates.len()
                );
                Ok((Route::Negotiate(candidates), None))
            }
        }
    }

    /// Recognize one image.
    ///
    /// Classification and post-analysis failures are absorbed; provider and
    /// negotiation failures are returned.
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
        config: &ProviderConfig,
    ) -> Result<RecognitionResult, RecognitionError> {
        let start = Instant::now();
        config.validate()?;
        if request.image.is_empty() {
            return Err(RecognitionError::Configuration("image is empty".to_string()));
        }

        let (route, dialect) = self.route(config)?;
        let timeout = dialect
            .map(|d| d.timeout(self.options.recognition_timeout, self.options.slow_timeout))
            .unwrap_or(self.options.recognition_timeout);
        let mut session = Session::new(
            self.transport.as_ref(),
            config,
            &request.image,
            route,
            timeout,
        );

        // Stage 1: classification (auto only, never with an override prompt)
        let classification =
            if classify::applies(request.category, request.override_prompt.as_deref()) {
                match classify::classify(&mut session).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        log::warn!("[CLASSIFY] Skipped, using default prompt: {}", e);
                        None
                    }
                }
            } else {
                None
            };
        let detected = classification.as_ref().map(|c| c.detected_type);

        // Stage 2: main recognition call
        let prompt = match (&request.override_prompt, &classification) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(classified)) => classified.optimized_prompt.clone(),
            (None, None) => prompts::prompt_for(request.category).to_string(),
        };
        let budget_category = match request.category {
            Category::Auto => detected.unwrap_or(Category::Auto),
            explicit => explicit,
        };
        let budget = TokenBudget::for_request(budget_category, request.image.len());
        log::info!(
            "[PIPELINE] Recognizing {} bytes ({}), budget {:?}",
            request.image.len(),
            request.image.mime_type,
            budget
        );

        let completion = session.complete(&prompt, budget).await?;
        let has_text = !completion.text.trim().is_empty();
        let (content, original_content) = if has_text {
            clean_content(&completion.text)
        } else {
            (completion.content(), None)
        };

        // Stage 3: post-analysis on the recognized text only
        let special_analysis = if has_text {
            self.analyzers
                .dispatch(request.category, detected, &content)
                .await
        } else {
            None
        };

        let model_used = completion
            .metadata
            .model
            .clone()
            .unwrap_or_else(|| match (session.route(), dialect) {
                (_, Some(dialect)) => model_or_default(config, dialect),
                (Route::Pinned(candidate), None) => candidate.shape.model(config),
                _ => config.model.trim().to_string(),
            });

        let result = RecognitionResult {
            content,
            original_content,
            confidence: completion.confidence,
            model_used,
            provider_used: session.provider_label(),
            classification,
            special_analysis,
            notice: completion.notice,
        };

        log::info!(
            "[PIPELINE] Done in {}ms via {} ({} chars, confidence {:.2})",
            start.elapsed().as_millis(),
            result.provider_used,
            result.content.len(),
            result.confidence
        );

        if let Some(history) = &self.history {
            history.record(HistoryEntry::new(
                &request.image,
                request.category,
                result.clone(),
            ));
        }
        Ok(result)
    }

    /// Check that the configured endpoint is reachable with the key.
    pub async fn probe_connection(&self, config: &ProviderConfig) -> ProbeOutcome {
        if let Err(e) = config.validate() {
            return ProbeOutcome::unreachable(e.to_string());
        }
        let url = match self.rules.resolve(config) {
            Resolution::Known(dialect) => match self.adapters.get(dialect) {
                Some(adapter) => adapter.probe_url(config),
                None => {
                    return ProbeOutcome::unreachable(format!(
                        "no adapter registered for {}",
                        dialect
                    ))
                }
            },
            Resolution::SelfHostedUnknown => config.api_endpoint.trim().to_string(),
        };
        probe::probe(
            self.transport.as_ref(),
            config,
            &url,
            &self.options.probe_policy(),
        )
        .await
    }
}
