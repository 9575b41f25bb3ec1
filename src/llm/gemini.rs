//! Gemini dialect — `generateContent` via the Google AI API.
//!
//! Key differences from the OpenAI-style contract:
//! - API key in the URL query string, not a header
//! - Image sent as `inline_data` with a base64 payload
//! - Text in `candidates[0].content.parts[*].text`
//! - Output limit is `generationConfig.maxOutputTokens`

use serde_json::{json, Value};

use super::auth::AuthScheme;
use super::dialect::{encode_image, model_or_default, CallSpec, DialectAdapter, TokenLimits};
use super::envelope::{self, Completion, EnvelopeKind, ParseFailure};
use super::provider::Dialect;
use super::transport::{RawRequest, RawResponse};
use super::types::ImageInput;
use crate::config::ProviderConfig;

pub const GEMINI_LIMITS: TokenLimits = TokenLimits {
    standard: 8192,
    large_image: 12288,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

/// Gemini `generateContent` body. Shared with negotiation.
pub fn build_body(image: &ImageInput, prompt: &str, max_tokens: Option<u32>) -> Value {
    let mut generation_config = json!({ "temperature": 0.1 });
    if let Some(limit) = max_tokens {
        generation_config["maxOutputTokens"] = json!(limit);
    }
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": encode_image(image)
                        }
                    }
                ]
            }
        ],
        "generationConfig": generation_config
    })
}

/// Request URL for a relay speaking the Gemini contract.
///
/// A bare `/v1` or `/v1beta` base gets the model path appended; anything
/// else is taken to be the full method URL already.
pub fn relay_url(endpoint: &str, model: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.ends_with("/v1beta") || endpoint.ends_with("/v1") {
        format!("{}/models/{}:generateContent", endpoint, model)
    } else {
        endpoint.to_string()
    }
}

impl DialectAdapter for GeminiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Gemini
    }

    fn default_auth(&self) -> AuthScheme {
        AuthScheme::QueryKey
    }

    fn token_limits(&self) -> Option<TokenLimits> {
        Some(GEMINI_LIMITS)
    }

    fn build_request(&self, call: &CallSpec<'_>, config: &ProviderConfig) -> RawRequest {
        let model = model_or_default(config, Dialect::Gemini);
        let url = format!("{}/models/{}:generateContent", self.base_url(config), model);
        let body = build_body(call.image, call.prompt, self.max_tokens(call.budget));
        RawRequest::post(url, body, call.timeout)
    }

    fn parse_response(&self, response: &RawResponse) -> Result<Completion, ParseFailure> {
        envelope::parse_response(response, Some(EnvelopeKind::Gemini))
    }
}
