//! Configuration — provider settings and recognizer tuning.
//!
//! Sources, highest priority first:
//!   1. `VISION_*` environment variables (optionally loaded from .env files)
//!   2. the provider's own key variable (`GEMINI_API_KEY`, ...)
//!   3. the OS keychain (service "vision-relay", account = provider id)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::RecognitionError;
use crate::llm::probe::ProbePolicy;
use crate::llm::provider::ProviderTag;

/// Keychain service name for stored API keys.
pub const KEYRING_SERVICE: &str = "vision-relay";

pub const ENV_PROVIDER: &str = "VISION_PROVIDER";
pub const ENV_MODEL: &str = "VISION_MODEL";
pub const ENV_API_KEY: &str = "VISION_API_KEY";
pub const ENV_API_ENDPOINT: &str = "VISION_API_ENDPOINT";
pub const ENV_SELF_HOSTED: &str = "VISION_SELF_HOSTED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    InvalidProvider(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("no API key found for {0} (set VISION_API_KEY, the provider's key variable, or store one in the keychain)")]
    MissingKey(String),
}

impl From<ConfigError> for RecognitionError {
    fn from(err: ConfigError) -> Self {
        RecognitionError::Configuration(err.to_string())
    }
}

/// Per-request provider settings. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key: String,
    pub api_endpoint: String,
    pub declared_provider: Option<ProviderTag>,
    pub is_self_hosted: bool,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub fn with_provider(mut self, tag: ProviderTag) -> Self {
        self.declared_provider = Some(tag);
        self
    }

    pub fn self_hosted(mut self, is_self_hosted: bool) -> Self {
        self.is_self_hosted = is_self_hosted;
        self
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.api_key.trim().is_empty() {
            return Err(RecognitionError::Configuration(
                "API key is missing".to_string(),
            ));
        }
        if self.is_self_hosted && self.api_endpoint.trim().is_empty() {
            return Err(RecognitionError::Configuration(
                "self-hosted provider requires an API endpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Build from `VISION_*` variables with key fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let declared = match non_empty_var(ENV_PROVIDER) {
            Some(raw) => Some(raw.parse::<ProviderTag>().map_err(ConfigError::InvalidProvider)?),
            None => None,
        };
        Self::from_env_for(declared)
    }

    /// Same as `from_env`, with the provider chosen by the caller.
    pub fn from_env_for(declared: Option<ProviderTag>) -> Result<Self, ConfigError> {
        let is_self_hosted = match non_empty_var(ENV_SELF_HOSTED) {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: ENV_SELF_HOSTED,
                value: raw,
            })?,
            None => declared == Some(ProviderTag::Custom),
        };

        let api_key = non_empty_var(ENV_API_KEY)
            .or_else(|| declared.and_then(provider_api_key))
            .ok_or_else(|| {
                ConfigError::MissingKey(
                    declared
                        .and_then(ProviderTag::dialect)
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "the configured provider".to_string()),
                )
            })?;

        let config = Self {
            model: non_empty_var(ENV_MODEL).unwrap_or_default(),
            api_key,
            api_endpoint: non_empty_var(ENV_API_ENDPOINT).unwrap_or_default(),
            declared_provider: declared,
            is_self_hosted,
        };
        log::info!(
            "[CONFIG] provider={:?} model={:?} endpoint={:?} self_hosted={} key_len={}",
            config.declared_provider,
            config.model,
            config.api_endpoint,
            config.is_self_hosted,
            config.api_key.len()
        );
        Ok(config)
    }

    /// Config for a vendor provider using only its own key sources
    /// (provider env variable, then keychain). Model and endpoint default.
    pub fn for_provider(tag: ProviderTag) -> Result<Self, ConfigError> {
        if tag.dialect().is_none() {
            return Err(ConfigError::InvalidProvider(
                "a custom provider needs an explicit endpoint and key".to_string(),
            ));
        }
        let api_key = provider_api_key(tag).ok_or_else(|| ConfigError::MissingKey(tag.to_string()))?;
        Ok(Self::new("", api_key).with_provider(tag))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Provider key from its own env variable, then the keychain.
fn provider_api_key(tag: ProviderTag) -> Option<String> {
    let dialect = tag.dialect()?;
    non_empty_var(dialect.env_key()).or_else(|| keychain_key(dialect.id()))
}

/// Look up a stored key in the OS keychain.
pub fn keychain_key(account: &str) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, account).ok()?;
    match entry.get_password() {
        Ok(key) if !key.is_empty() => {
            log::info!("[CONFIG] Loaded {} key from OS keychain", account);
            Some(key)
        }
        _ => None,
    }
}

/// Store a key in the OS keychain.
///
/// The key is read back through a fresh entry before reporting success, so a
/// store that silently drops writes surfaces as an error.
pub fn store_keychain_key(account: &str, key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, account)
        .map_err(|e| format!("Keychain error: {}", e))?;
    entry
        .set_password(key)
        .map_err(|e| format!("Failed to save key: {}", e))?;

    let stored = keyring::Entry::new(KEYRING_SERVICE, account)
        .and_then(|fresh| fresh.get_password())
        .ok();
    if stored.as_deref() != Some(key) {
        log::error!("[CONFIG] Keychain accepted {} key but did not persist it", account);
        return Err("Keychain did not persist the key".to_string());
    }

    log::info!("[CONFIG] Saved {} key to OS keychain", account);
    Ok(())
}

/// Load `.env.local` or `.env` from the working directory (first found),
/// then the user config file. Existing variables are never overwritten.
///
/// Runs before the logger is up, so failures go to stderr directly.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    'local: for name in [".env.local", ".env"] {
        let path = PathBuf::from(name);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(()) => loaded.push(path),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'local;
        }
    }

    if let Some(path) = user_env_file() {
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(()) => loaded.push(path),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
        }
    }
    loaded
}

/// `~/.config/vision-relay/.env` (platform equivalent).
pub fn user_env_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vision-relay").join(".env"))
}

/// Timeouts and pacing for the recognizer, batch runner and prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizerOptions {
    /// Per-call timeout for recognition.
    pub recognition_timeout: Duration,
    /// Per-call timeout for providers known to be slow.
    pub slow_timeout: Duration,
    pub probe_timeout: Duration,
    pub probe_retries: u32,
    pub probe_retry_delay: Duration,
    /// Pause between batch items and between compared providers.
    pub batch_delay: Duration,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            recognition_timeout: Duration::from_secs(60),
            slow_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(15),
            probe_retries: 3,
            probe_retry_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(1),
        }
    }
}

impl RecognizerOptions {
    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            attempt_timeout: self.probe_timeout,
            retries: self.probe_retries,
            retry_delay: self.probe_retry_delay,
        }
    }
}
