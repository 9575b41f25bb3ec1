//! Anthropic Claude dialect — Messages API with a base64 image block.

use serde_json::json;

use super::auth::AuthScheme;
use super::dialect::{encode_image, model_or_default, CallSpec, DialectAdapter, TokenLimits};
use super::envelope::{self, Completion, EnvelopeKind, ParseFailure};
use super::provider::Dialect;
use super::transport::{RawRequest, RawResponse};
use crate::config::ProviderConfig;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const CLAUDE_LIMITS: TokenLimits = TokenLimits {
    standard: 4096,
    large_image: 8192,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeAdapter;

impl DialectAdapter for ClaudeAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Claude
    }

    fn default_auth(&self) -> AuthScheme {
        AuthScheme::ApiKeyHeader
    }

    fn token_limits(&self) -> Option<TokenLimits> {
        Some(CLAUDE_LIMITS)
    }

    fn build_request(&self, call: &CallSpec<'_>, config: &ProviderConfig) -> RawRequest {
        let model = model_or_default(config, Dialect::Claude);
        // max_tokens is mandatory on this API.
        let max_tokens = CLAUDE_LIMITS.for_budget(call.budget);
        let body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": call.image.mime_type,
                                "data": encode_image(call.image)
                            }
                        },
                        { "type": "text", "text": call.prompt }
                    ]
                }
            ]
        });
        RawRequest::post(format!("{}/v1/messages", self.base_url(config)), body, call.timeout)
            .with_header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn parse_response(&self, response: &RawResponse) -> Result<Completion, ParseFailure> {
        envelope::parse_response(response, Some(EnvelopeKind::Claude))
    }

    fn probe_url(&self, config: &ProviderConfig) -> String {
        format!("{}/v1/models", self.base_url(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::dialect::TokenBudget;
    use crate::llm::types::ImageInput;
    use std::time::Duration;

    #[test]
    fn request_shape() {
        let image = ImageInput::from_bytes(vec![1, 2, 3]).with_mime_type("image/webp");
        let call = CallSpec {
            image: &image,
            prompt: "transcribe",
            budget: TokenBudget::Standard,
            timeout: Duration::from_secs(60),
        };
        let req = ClaudeAdapter.build_request(&call, &ProviderConfig::new("", "k"));
        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(req.header("anthropic-version"), Some(ANTHROPIC_VERSION));
        let body = req.body.unwrap();
        assert_eq!(body["model"], "claude-haiku-4-5-20251001");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "image/webp");
        assert_eq!(body["messages"][0]["content"][1]["text"], "transcribe");
    }

    #[test]
    fn probe_path() {
        let config = ProviderConfig::new("", "k").with_endpoint("https://proxy.anthropic.com/");
        assert_eq!(ClaudeAdapter.probe_url(&config), "https://proxy.anthropic.com/v1/models");
    }
}
