//! Dialect adapter seam and the shared token-budget policy.
//!
//! One adapter per known provider contract. The orchestrator looks adapters
//! up in an `AdapterRegistry` that is built once and never mutated, so a
//! test can hand in its own set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;

use super::anthropic::ClaudeAdapter;
use super::auth::AuthScheme;
use super::envelope::{Completion, ParseFailure};
use super::gemini::GeminiAdapter;
use super::openai::OpenAiChatAdapter;
use super::provider::Dialect;
use super::transport::{RawRequest, RawResponse};
use super::types::{Category, ImageInput};
use crate::config::ProviderConfig;

/// Images at or above this size get the large-image budget.
pub const LARGE_IMAGE_BYTES: usize = 500 * 1024;
/// Output limit for data-dense table recognition.
pub const TABLE_MAX_TOKENS: u32 = 16384;
/// Output limit for the classification pre-calls.
pub const CLASSIFY_MAX_TOKENS: u32 = 256;

/// How much output a call is allowed to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBudget {
    Classification,
    Standard,
    LargeImage,
    Table,
}

impl TokenBudget {
    pub fn for_request(category: Category, image_len: usize) -> Self {
        if category == Category::Table {
            TokenBudget::Table
        } else if image_len >= LARGE_IMAGE_BYTES {
            TokenBudget::LargeImage
        } else {
            TokenBudget::Standard
        }
    }
}

/// Per-dialect output limits for the standard and large-image budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub standard: u32,
    pub large_image: u32,
}

impl TokenLimits {
    pub fn for_budget(self, budget: TokenBudget) -> u32 {
        match budget {
            TokenBudget::Classification => CLASSIFY_MAX_TOKENS,
            TokenBudget::Standard => self.standard,
            TokenBudget::LargeImage => self.large_image,
            TokenBudget::Table => TABLE_MAX_TOKENS,
        }
    }
}

/// Everything a single provider call needs besides the configuration.
#[derive(Debug, Clone, Copy)]
pub struct CallSpec<'a> {
    pub image: &'a ImageInput,
    pub prompt: &'a str,
    pub budget: TokenBudget,
    pub timeout: Duration,
}

pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Where this dialect expects the API key.
    fn default_auth(&self) -> AuthScheme;

    /// `None` for contracts without an output-length parameter.
    fn token_limits(&self) -> Option<TokenLimits>;

    fn max_tokens(&self, budget: TokenBudget) -> Option<u32> {
        self.token_limits().map(|limits| limits.for_budget(budget))
    }

    /// Configured endpoint without a trailing slash, or the vendor default.
    fn base_url(&self, config: &ProviderConfig) -> String {
        let endpoint = config.api_endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            self.dialect().default_base_url().to_string()
        } else {
            endpoint.to_string()
        }
    }

    /// Build the recognition request, without authentication.
    fn build_request(&self, call: &CallSpec<'_>, config: &ProviderConfig) -> RawRequest;

    fn parse_response(&self, response: &RawResponse) -> Result<Completion, ParseFailure>;

    /// URL a reachability probe should GET.
    fn probe_url(&self, config: &ProviderConfig) -> String {
        format!("{}/models", self.base_url(config))
    }
}

/// Model name from the config, or the dialect default when blank.
pub fn model_or_default(config: &ProviderConfig, dialect: Dialect) -> String {
    if config.model.trim().is_empty() {
        dialect.default_model().to_string()
    } else {
        config.model.trim().to_string()
    }
}

pub fn encode_image(image: &ImageInput) -> String {
    base64::engine::general_purpose::STANDARD.encode(&image.bytes)
}

/// Immutable dialect → adapter mapping, injected into the `Recognizer`.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Dialect, Arc<dyn DialectAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Adapters for every built-in dialect.
    pub fn standard() -> Self {
        Self::empty()
            .with(GeminiAdapter)
            .with(OpenAiChatAdapter::new(Dialect::OpenAi))
            .with(OpenAiChatAdapter::new(Dialect::OpenRouter))
            .with(OpenAiChatAdapter::new(Dialect::DeepSeek))
            .with(ClaudeAdapter)
    }

    /// Consuming builder step; replaces any adapter for the same dialect.
    pub fn with(mut self, adapter: impl DialectAdapter + 'static) -> Self {
        self.adapters.insert(adapter.dialect(), Arc::new(adapter));
        self
    }

    pub fn get(&self, dialect: Dialect) -> Option<Arc<dyn DialectAdapter>> {
        self.adapters.get(&dialect).cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
