//! Connection prober — validates endpoint reachability and credentials
//! without running a recognition.
//!
//! Issues GETs against the probe URL, one per auth scheme in negotiation
//! order. HTTP 200 or 403 counts as reachable (403 means the transport and
//! key were understood but the scope was refused). When nothing succeeds
//! and the last failure was transient (network error, timeout, 408, 429 or
//! 5xx) the final attempt is retried a few times to ride out network blips.
//! A definite rejection such as 401 or 404 is reported straight away.

use std::time::Duration;

use serde::Serialize;

use super::auth::AuthScheme;
use super::transport::{RawRequest, Transport};
use crate::config::ProviderConfig;
use crate::error::extract_error_message;

/// Timeouts and retry schedule for one probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub attempt_timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(15),
            retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub message: String,
    pub status: Option<u16>,
    pub auth: Option<AuthScheme>,
}

impl ProbeOutcome {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            reachable: false,
            message: message.into(),
            status: None,
            auth: None,
        }
    }
}

enum ProbeAttempt {
    Reachable(u16),
    Failed {
        status: Option<u16>,
        reason: String,
        transient: bool,
    },
}

fn is_reachable_status(status: u16) -> bool {
    status == 200 || status == 403
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

async fn attempt(
    transport: &dyn Transport,
    url: &str,
    auth: AuthScheme,
    api_key: &str,
    timeout: Duration,
) -> ProbeAttempt {
    let mut request = RawRequest::get(url, timeout);
    auth.apply(&mut request, api_key);

    match transport.send(request).await {
        Ok(response) if is_reachable_status(response.status) => {
            ProbeAttempt::Reachable(response.status)
        }
        Ok(response) => ProbeAttempt::Failed {
            status: Some(response.status),
            reason: format!(
                "HTTP {}: {}",
                response.status,
                extract_error_message(&response.body)
            ),
            transient: is_transient_status(response.status),
        },
        Err(e) => ProbeAttempt::Failed {
            status: None,
            reason: e.to_string(),
            transient: true,
        },
    }
}

fn reachable(status: u16, auth: AuthScheme) -> ProbeOutcome {
    let message = if status == 403 {
        format!(
            "Endpoint reachable with {}, but access to this resource was refused (HTTP 403)",
            auth
        )
    } else {
        format!("Connected with {} (HTTP {})", auth, status)
    };
    ProbeOutcome {
        reachable: true,
        message,
        status: Some(status),
        auth: Some(auth),
    }
}

/// Probe `url` with every auth scheme, then retry the final one.
pub async fn probe(
    transport: &dyn Transport,
    config: &ProviderConfig,
    url: &str,
    policy: &ProbePolicy,
) -> ProbeOutcome {
    if url.trim().is_empty() {
        return ProbeOutcome::unreachable("No endpoint configured to probe");
    }
    if config.api_key.trim().is_empty() {
        return ProbeOutcome::unreachable("No API key configured");
    }

    log::info!("[PROBE] Probing {} (key length {})", url, config.api_key.len());

    let mut last = None;
    for auth in AuthScheme::NEGOTIATION_ORDER {
        match attempt(transport, url, auth, &config.api_key, policy.attempt_timeout).await {
            ProbeAttempt::Reachable(status) => {
                log::info!("[PROBE] Reachable with {} (HTTP {})", auth, status);
                return reachable(status, auth);
            }
            ProbeAttempt::Failed {
                status,
                reason,
                transient,
            } => {
                log::debug!("[PROBE] {} failed: {}", auth, reason);
                last = Some((auth, status, reason, transient));
            }
        }
    }

    let Some((auth, mut status, mut reason, mut transient)) = last else {
        return ProbeOutcome::unreachable("No authentication schemes to try");
    };
    if !transient {
        log::info!("[PROBE] Last failure is not transient, skipping retries");
    }

    let mut retry = 0;
    while transient && retry < policy.retries {
        retry += 1;
        log::warn!(
            "[PROBE] Retry {}/{} with {} in {:?}",
            retry,
            policy.retries,
            auth,
            policy.retry_delay
        );
        tokio::time::sleep(policy.retry_delay).await;
        match attempt(transport, url, auth, &config.api_key, policy.attempt_timeout).await {
            ProbeAttempt::Reachable(code) => return reachable(code, auth),
            ProbeAttempt::Failed {
                status: code,
                reason: why,
                transient: again,
            } => {
                status = code;
                reason = why;
                transient = again;
            }
        }
    }

    log::error!("[PROBE] {} unreachable: {}", url, reason);
    ProbeOutcome {
        reachable: false,
        message: format!("Connection failed: {}", reason),
        status,
        auth: None,
    }
}
