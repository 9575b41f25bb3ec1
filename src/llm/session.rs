//! Request-scoped call routing.
//!
//! A `Session` lives for exactly one `recognize` call. It starts either on a
//! known adapter or on a list of negotiation candidates; once a candidate is
//! accepted it is pinned, so every later call of the same request (the
//! classification pre-calls and the main call) goes through one contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::dialect::{CallSpec, DialectAdapter, TokenBudget};
use super::envelope::{Completion, CompletionMetadata, ParseFailure};
use super::negotiate::{self, DialectCandidate};
use super::transport::{RawRequest, RawResponse, Transport};
use super::types::ImageInput;
use crate::config::ProviderConfig;
use crate::error::RecognitionError;

/// Anything that can turn a prompt about the current image into an answer.
#[async_trait]
pub trait Completer: Send {
    async fn complete(
        &mut self,
        prompt: &str,
        budget: TokenBudget,
    ) -> Result<Completion, RecognitionError>;
}

#[derive(Clone)]
pub enum Route {
    Adapter(Arc<dyn DialectAdapter>),
    Negotiate(Vec<DialectCandidate>),
    Pinned(DialectCandidate),
}

pub struct Session<'a> {
    transport: &'a dyn Transport,
    config: &'a ProviderConfig,
    image: &'a ImageInput,
    route: Route,
    timeout: Duration,
}

impl<'a> Session<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        config: &'a ProviderConfig,
        image: &'a ImageInput,
        route: Route,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            config,
            image,
            route,
            timeout,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Name of the provider or negotiated contract, for results and logs.
    pub fn provider_label(&self) -> String {
        match &self.route {
            Route::Adapter(adapter) => adapter.dialect().to_string(),
            Route::Pinned(candidate) => format!("self-hosted ({})", candidate),
            Route::Negotiate(_) => "self-hosted".to_string(),
        }
    }

    async fn send_checked(
        &self,
        request: RawRequest,
    ) -> Result<RawResponse, RecognitionError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let err = RecognitionError::from_status(response.status, &response.body);
            log::error!("[LLM] {} returned {}", self.provider_label(), err);
            return Err(err);
        }
        Ok(response)
    }
}

/// Unparseable answers from an established contract are degraded, not errors.
fn degrade(failure: ParseFailure) -> Completion {
    log::warn!("[LLM] Degraded response: {}", failure);
    Completion::degraded(
        String::new(),
        format!("The provider's answer could not be read ({}).", failure),
        CompletionMetadata::default(),
    )
}

#[async_trait]
impl<'a> Completer for Session<'a> {
    async fn complete(
        &mut self,
        prompt: &str,
        budget: TokenBudget,
    ) -> Result<Completion, RecognitionError> {
        let call = CallSpec {
            image: self.image,
            prompt,
            budget,
            timeout: self.timeout,
        };

        match self.route.clone() {
            Route::Adapter(adapter) => {
                let mut request = adapter.build_request(&call, self.config);
                adapter.default_auth().apply(&mut request, &self.config.api_key);
                let response = self.send_checked(request).await?;
                Ok(adapter.parse_response(&response).unwrap_or_else(degrade))
            }
            Route::Pinned(candidate) => {
                let request = candidate.build_request(&call, self.config);
                let response = self.send_checked(request).await?;
                Ok(candidate.parse_response(&response).unwrap_or_else(degrade))
            }
            Route::Negotiate(candidates) => {
                let negotiated =
                    negotiate::negotiate(self.transport, &candidates, &call, self.config).await?;
                self.route = Route::Pinned(negotiated.candidate);
                Ok(negotiated.completion)
            }
        }
    }
}
