//! OpenAI chat-completions dialect.
//!
//! Spoken by OpenAI itself, OpenRouter and DeepSeek; they differ only in
//! base URL, default model and a couple of courtesy headers.

use serde_json::{json, Value};

use super::auth::AuthScheme;
use super::dialect::{encode_image, model_or_default, CallSpec, DialectAdapter, TokenLimits};
use super::envelope::{self, Completion, EnvelopeKind, ParseFailure};
use super::provider::Dialect;
use super::transport::{RawRequest, RawResponse};
use super::types::ImageInput;
use crate::config::ProviderConfig;

pub const OPENAI_LIMITS: TokenLimits = TokenLimits {
    standard: 4096,
    large_image: 8192,
};

#[derive(Debug, Clone, Copy)]
pub struct OpenAiChatAdapter {
    dialect: Dialect,
}

impl OpenAiChatAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

/// Chat-completions body with the image as a data URL. Shared with negotiation.
pub fn build_body(model: &str, image: &ImageInput, prompt: &str, max_tokens: Option<u32>) -> Value {
    let data_url = format!("data:{};base64,{}", image.mime_type, encode_image(image));
    let mut body = json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }
        ],
        "temperature": 0.1
    });
    if let Some(limit) = max_tokens {
        body["max_tokens"] = json!(limit);
    }
    body
}

/// Request URL for a relay speaking the chat-completions contract.
pub fn relay_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.ends_with("/v1") {
        format!("{}/chat/completions", endpoint)
    } else {
        endpoint.to_string()
    }
}

impl DialectAdapter for OpenAiChatAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn default_auth(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn token_limits(&self) -> Option<TokenLimits> {
        Some(OPENAI_LIMITS)
    }

    fn build_request(&self, call: &CallSpec<'_>, config: &ProviderConfig) -> RawRequest {
        let model = model_or_default(config, self.dialect);
        let url = format!("{}/chat/completions", self.base_url(config));
        let body = build_body(&model, call.image, call.prompt, self.max_tokens(call.budget));
        let request = RawRequest::post(url, body, call.timeout);
        match self.dialect {
            Dialect::OpenRouter => request
                .with_header("HTTP-Referer", "https://github.com/vision-relay")
                .with_header("X-Title", "vision-relay"),
            _ => request,
        }
    }

    fn parse_response(&self, response: &RawResponse) -> Result<Completion, ParseFailure> {
        envelope::parse_response(response, Some(EnvelopeKind::OpenAiChat))
    }
}
