//! Authentication schemes for provider requests.
//!
//! Known dialects use one fixed scheme. Negotiation and probing walk
//! `AuthScheme::NEGOTIATION_ORDER` because relay endpoints accept keys in
//! whatever place their operator picked.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::transport::RawRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-goog-api-key: <key>`
    GoogleApiKey,
    /// `x-api-key: <key>`
    ApiKeyHeader,
    /// `Cookie: api_key=<key>`
    Cookie,
    /// `?key=<key>`
    QueryKey,
}

impl AuthScheme {
    pub const NEGOTIATION_ORDER: [AuthScheme; 5] = [
        AuthScheme::Bearer,
        AuthScheme::GoogleApiKey,
        AuthScheme::ApiKeyHeader,
        AuthScheme::Cookie,
        AuthScheme::QueryKey,
    ];

    /// Attach `api_key` to the request according to this scheme.
    pub fn apply(self, request: &mut RawRequest, api_key: &str) {
        match self {
            AuthScheme::Bearer => request
                .headers
                .push(("authorization".to_string(), format!("Bearer {api_key}"))),
            AuthScheme::GoogleApiKey => request
                .headers
                .push(("x-goog-api-key".to_string(), api_key.to_string())),
            AuthScheme::ApiKeyHeader => request
                .headers
                .push(("x-api-key".to_string(), api_key.to_string())),
            AuthScheme::Cookie => request
                .headers
                .push(("cookie".to_string(), format!("api_key={api_key}"))),
            AuthScheme::QueryKey => request.url = append_query_key(&request.url, api_key),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthScheme::Bearer => "bearer",
            AuthScheme::GoogleApiKey => "google api-key header",
            AuthScheme::ApiKeyHeader => "api-key header",
            AuthScheme::Cookie => "cookie",
            AuthScheme::QueryKey => "query key",
        };
        f.write_str(label)
    }
}

fn append_query_key(url: &str, api_key: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("key", api_key);
            parsed.to_string()
        }
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}key={api_key}")
        }
    }
}
