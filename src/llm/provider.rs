//! Provider identity — which API dialect a configuration speaks.
//!
//! Resolution order: declared provider tag, then the endpoint host rule
//! table, then model-name hints. Anything left over is a self-hosted relay
//! whose contract has to be negotiated.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;

/// Provider tag as declared by the settings collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Gemini,
    OpenAi,
    OpenRouter,
    Claude,
    DeepSeek,
    Custom,
}

impl ProviderTag {
    /// The dialect a tag commits to. `Custom` commits to nothing.
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            ProviderTag::Gemini => Some(Dialect::Gemini),
            ProviderTag::OpenAi => Some(Dialect::OpenAi),
            ProviderTag::OpenRouter => Some(Dialect::OpenRouter),
            ProviderTag::Claude => Some(Dialect::Claude),
            ProviderTag::DeepSeek => Some(Dialect::DeepSeek),
            ProviderTag::Custom => None,
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dialect() {
            Some(dialect) => f.write_str(dialect.id()),
            None => f.write_str("custom"),
        }
    }
}

impl FromStr for ProviderTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderTag::Gemini),
            "openai" => Ok(ProviderTag::OpenAi),
            "openrouter" => Ok(ProviderTag::OpenRouter),
            "claude" | "anthropic" => Ok(ProviderTag::Claude),
            "deepseek" => Ok(ProviderTag::DeepSeek),
            "custom" | "self-hosted" | "relay" => Ok(ProviderTag::Custom),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// A request/response contract spoken by one provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Gemini,
    OpenAi,
    OpenRouter,
    Claude,
    DeepSeek,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Gemini,
        Dialect::OpenAi,
        Dialect::OpenRouter,
        Dialect::Claude,
        Dialect::DeepSeek,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Dialect::Gemini => "gemini",
            Dialect::OpenAi => "openai",
            Dialect::OpenRouter => "openrouter",
            Dialect::Claude => "claude",
            Dialect::DeepSeek => "deepseek",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Dialect::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Dialect::OpenAi => "https://api.openai.com/v1",
            Dialect::OpenRouter => "https://openrouter.ai/api/v1",
            Dialect::Claude => "https://api.anthropic.com",
            Dialect::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Dialect::Gemini => "gemini-2.0-flash",
            Dialect::OpenAi => "gpt-4o-mini",
            Dialect::OpenRouter => "openai/gpt-4o-mini",
            Dialect::Claude => "claude-haiku-4-5-20251001",
            Dialect::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable holding this provider's key.
    pub fn env_key(self) -> &'static str {
        match self {
            Dialect::Gemini => "GEMINI_API_KEY",
            Dialect::OpenAi => "OPENAI_API_KEY",
            Dialect::OpenRouter => "OPENROUTER_API_KEY",
            Dialect::Claude => "ANTHROPIC_API_KEY",
            Dialect::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Providers that routinely take longer than a minute on images.
    pub fn is_slow(self) -> bool {
        matches!(self, Dialect::DeepSeek)
    }

    pub fn timeout(self, general: Duration, slow: Duration) -> Duration {
        if self.is_slow() {
            slow
        } else {
            general
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome of provider identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Known(Dialect),
    /// Private relay/proxy. Normal, not an error.
    SelfHostedUnknown,
}

/// Ordered, declarative pattern → dialect table.
///
/// Host rules are matched (substring, case-insensitive) against the
/// endpoint; model rules against the model name. First match wins.
#[derive(Debug, Clone)]
pub struct ResolverRules {
    pub host_rules: Vec<(String, Dialect)>,
    pub model_rules: Vec<(String, Dialect)>,
}

impl Default for ResolverRules {
    fn default() -> Self {
        let host_rules = [
            ("googleapis.com", Dialect::Gemini),
            ("openrouter.ai", Dialect::OpenRouter),
            ("anthropic.com", Dialect::Claude),
            ("deepseek.com", Dialect::DeepSeek),
            ("api.openai.com", Dialect::OpenAi),
        ];
        let model_rules = [
            ("gemini", Dialect::Gemini),
            ("claude", Dialect::Claude),
            ("deepseek", Dialect::DeepSeek),
        ];
        Self {
            host_rules: host_rules
                .iter()
                .map(|(p, d)| (p.to_string(), *d))
                .collect(),
            model_rules: model_rules
                .iter()
                .map(|(p, d)| (p.to_string(), *d))
                .collect(),
        }
    }
}

impl ResolverRules {
    /// Resolve a configuration to a dialect. Pure.
    pub fn resolve(&self, config: &ProviderConfig) -> Resolution {
        if let Some(dialect) = config.declared_provider.and_then(ProviderTag::dialect) {
            return Resolution::Known(dialect);
        }

        let endpoint = config.api_endpoint.to_lowercase();
        if !endpoint.is_empty() {
            if let Some(dialect) = first_match(&self.host_rules, &endpoint) {
                return Resolution::Known(dialect);
            }
        }

        // A relay may serve a "gemini-*" model through its own contract, so
        // model hints are ignored for endpoints flagged as self-hosted.
        if !config.is_self_hosted {
            let model = config.model.to_lowercase();
            if let Some(dialect) = first_match(&self.model_rules, &model) {
                return Resolution::Known(dialect);
            }
        }

        Resolution::SelfHostedUnknown
    }
}

fn first_match(rules: &[(String, Dialect)], haystack: &str) -> Option<Dialect> {
    rules
        .iter()
        .find(|(pattern, _)| haystack.contains(&pattern.to_lowercase()))
        .map(|(_, dialect)| *dialect)
}

/// Provider metadata exposed to settings screens and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: String,
    pub default_model: String,
    pub default_endpoint: String,
}

/// All known providers and their display info.
pub fn all_providers() -> Vec<ProviderInfo> {
    Dialect::ALL
        .iter()
        .map(|d| ProviderInfo {
            id: d.id().to_string(),
            name: display_name(*d).to_string(),
            env_key: d.env_key().to_string(),
            default_model: d.default_model().to_string(),
            default_endpoint: d.default_base_url().to_string(),
        })
        .collect()
}

fn display_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Gemini => "Google Gemini",
        Dialect::OpenAi => "OpenAI",
        Dialect::OpenRouter => "OpenRouter",
        Dialect::Claude => "Anthropic Claude",
        Dialect::DeepSeek => "DeepSeek",
    }
}

/// Check if a provider has an API key (env var or keychain).
pub fn is_provider_configured(dialect: Dialect) -> bool {
    std::env::var(dialect.env_key())
        .map(|k| !k.is_empty())
        .unwrap_or(false)
        || crate::config::keychain_key(dialect.id()).is_some()
}
