//! Negotiation engine for self-hosted relay endpoints.
//!
//! A relay's contract is unknown, so we enumerate a small fixed list of
//! (body shape, auth scheme) candidates and stop at the first one that
//! comes back as a usable answer. Each attempt yields an `AttemptOutcome`;
//! failures are collected, never thrown.

use std::fmt;

use super::auth::AuthScheme;
use super::dialect::{model_or_default, CallSpec, TokenBudget};
use super::envelope::{self, Completion, EnvelopeKind, ParseFailure};
use super::gemini::{self, GEMINI_LIMITS};
use super::generic;
use super::openai::{self, OPENAI_LIMITS};
use super::provider::Dialect;
use super::transport::{RawRequest, RawResponse, Transport, TransportError};
use crate::config::ProviderConfig;
use crate::error::{extract_error_message, AttemptFailure, RecognitionError};

/// Request body contract tried against a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyShape {
    Gemini,
    OpenAiChat,
    Generic,
}

impl BodyShape {
    fn envelope(self) -> Option<EnvelopeKind> {
        match self {
            BodyShape::Gemini => Some(EnvelopeKind::Gemini),
            BodyShape::OpenAiChat => Some(EnvelopeKind::OpenAiChat),
            BodyShape::Generic => None,
        }
    }

    pub fn max_tokens(self, budget: TokenBudget) -> Option<u32> {
        match self {
            BodyShape::Gemini => Some(GEMINI_LIMITS.for_budget(budget)),
            BodyShape::OpenAiChat => Some(OPENAI_LIMITS.for_budget(budget)),
            BodyShape::Generic => None,
        }
    }

    fn url(self, config: &ProviderConfig) -> String {
        match self {
            BodyShape::Gemini => gemini::relay_url(&config.api_endpoint, &self.model(config)),
            BodyShape::OpenAiChat => openai::relay_url(&config.api_endpoint),
            BodyShape::Generic => config.api_endpoint.trim().to_string(),
        }
    }

    /// Model name sent (or addressed) by this shape.
    pub fn model(self, config: &ProviderConfig) -> String {
        match self {
            BodyShape::Gemini => model_or_default(config, Dialect::Gemini),
            BodyShape::OpenAiChat => model_or_default(config, Dialect::OpenAi),
            BodyShape::Generic => config.model.trim().to_string(),
        }
    }

    fn body(self, call: &CallSpec<'_>, config: &ProviderConfig) -> serde_json::Value {
        let max_tokens = self.max_tokens(call.budget);
        match self {
            BodyShape::Gemini => gemini::build_body(call.image, call.prompt, max_tokens),
            BodyShape::OpenAiChat => {
                openai::build_body(&self.model(config), call.image, call.prompt, max_tokens)
            }
            BodyShape::Generic => generic::build_body(&self.model(config), call.image, call.prompt),
        }
    }
}

impl fmt::Display for BodyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BodyShape::Gemini => "gemini",
            BodyShape::OpenAiChat => "openai-chat",
            BodyShape::Generic => "generic",
        })
    }
}

/// One (request shape, auth scheme) pairing. Plain value, built per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialectCandidate {
    pub shape: BodyShape,
    pub auth: AuthScheme,
}

impl DialectCandidate {
    /// Complete request for this candidate, authentication included.
    pub fn build_request(&self, call: &CallSpec<'_>, config: &ProviderConfig) -> RawRequest {
        let mut request =
            RawRequest::post(self.shape.url(config), self.shape.body(call, config), call.timeout);
        self.auth.apply(&mut request, &config.api_key);
        request
    }

    pub fn parse_response(&self, response: &RawResponse) -> Result<Completion, ParseFailure> {
        envelope::parse_response(response, self.shape.envelope())
    }
}

impl fmt::Display for DialectCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} body + {}", self.shape, self.auth)
    }
}

/// Deterministic candidate list for a relay endpoint.
///
/// A chat-completions path puts the OpenAI body first; otherwise Gemini,
/// OpenAI, generic. Every shape is paired with every auth scheme in
/// `AuthScheme::NEGOTIATION_ORDER`.
pub fn candidate_order(config: &ProviderConfig) -> Vec<DialectCandidate> {
    let endpoint = config.api_endpoint.to_lowercase();
    let shapes = if endpoint.contains("chat/completions") {
        [BodyShape::OpenAiChat, BodyShape::Gemini, BodyShape::Generic]
    } else {
        [BodyShape::Gemini, BodyShape::OpenAiChat, BodyShape::Generic]
    };
    shapes
        .iter()
        .flat_map(|shape| {
            AuthScheme::NEGOTIATION_ORDER
                .iter()
                .map(move |auth| DialectCandidate {
                    shape: *shape,
                    auth: *auth,
                })
        })
        .collect()
}

/// Result of sending one candidate.
#[derive(Debug)]
pub enum AttemptOutcome {
    Accepted(Completion),
    Transport(TransportError),
    Rejected { status: u16, message: String },
    Html(ParseFailure),
    Unparseable(ParseFailure),
    EmptyContent,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Accepted(_) => f.write_str("accepted"),
            AttemptOutcome::Transport(e) => write!(f, "{}", e),
            AttemptOutcome::Rejected { status, message } => write!(f, "HTTP {}: {}", status, message),
            AttemptOutcome::Html(e) | AttemptOutcome::Unparseable(e) => write!(f, "{}", e),
            AttemptOutcome::EmptyContent => f.write_str("response contained no text"),
        }
    }
}

/// The candidate that worked and the answer it produced.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub candidate: DialectCandidate,
    pub completion: Completion,
}

/// Send one candidate and judge the response.
pub async fn attempt(
    transport: &dyn Transport,
    candidate: DialectCandidate,
    call: &CallSpec<'_>,
    config: &ProviderConfig,
) -> AttemptOutcome {
    let request = candidate.build_request(call, config);
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => return AttemptOutcome::Transport(e),
    };

    if !response.is_success() {
        return AttemptOutcome::Rejected {
            status: response.status,
            message: extract_error_message(&response.body),
        };
    }
    if let Some(html) = envelope::response_html(&response) {
        return AttemptOutcome::Html(html);
    }
    match candidate.parse_response(&response) {
        Ok(completion) if completion.text.trim().is_empty() => AttemptOutcome::EmptyContent,
        Ok(completion) => AttemptOutcome::Accepted(completion),
        Err(failure) => AttemptOutcome::Unparseable(failure),
    }
}

/// Try `candidates` in order; first accepted answer wins.
pub async fn negotiate(
    transport: &dyn Transport,
    candidates: &[DialectCandidate],
    call: &CallSpec<'_>,
    config: &ProviderConfig,
) -> Result<Negotiated, RecognitionError> {
    let mut failures = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        log::info!(
            "[NEGOTIATE] Attempt {}/{}: {}",
            index + 1,
            candidates.len(),
            candidate
        );
        match attempt(transport, *candidate, call, config).await {
            AttemptOutcome::Accepted(completion) => {
                log::info!("[NEGOTIATE] Accepted: {}", candidate);
                return Ok(Negotiated {
                    candidate: *candidate,
                    completion,
                });
            }
            failure => {
                log::debug!("[NEGOTIATE] {} failed: {}", candidate, failure);
                failures.push(AttemptFailure {
                    candidate: candidate.to_string(),
                    reason: failure.to_string(),
                });
            }
        }
    }

    let last = failures
        .last()
        .map(|f| format!("{} ({})", f.reason, f.candidate))
        .unwrap_or_else(|| "no candidates to try".to_string());
    log::warn!(
        "[NEGOTIATE] Exhausted {} candidates for {}",
        failures.len(),
        config.api_endpoint
    );
    Err(RecognitionError::NegotiationExhausted {
        endpoint: config.api_endpoint.clone(),
        attempts: failures,
        last,
    })
}
