//! Response envelope parsing — one `Completion` out of any known shape.
//!
//! Shapes understood:
//! - Gemini:  `candidates[0].content.parts[*].text`
//! - OpenAI:  `choices[0].message.content` (string or part array), `choices[0].text`
//! - Claude:  `content[*].text`
//! - Flat:    `text | content | message | result | output | response`
//! - Raw:     a non-JSON, non-HTML text body
//!
//! Truncation and safety blocks are not failures: they produce a degraded
//! completion with a low confidence and a human-readable notice.

use serde_json::Value;
use thiserror::Error;

use super::transport::RawResponse;

/// Confidence reported for a clean answer from a structured envelope.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
/// Confidence for flat or raw-text answers, whose origin is less certain.
pub const LOOSE_CONFIDENCE: f64 = 0.85;
/// Confidence for truncated, blocked or otherwise degenerate answers.
pub const DEGRADED_CONFIDENCE: f64 = 0.3;

/// HTML documents longer than this are login or portal pages.
pub const PORTAL_PAGE_CHARS: usize = 1000;
const HTML_SNIFF_BYTES: usize = 512;

const FLAT_KEYS: [&str; 6] = ["text", "content", "message", "result", "output", "response"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Gemini,
    OpenAiChat,
    Claude,
    Flat,
}

impl EnvelopeKind {
    const ORDER: [EnvelopeKind; 4] = [
        EnvelopeKind::Gemini,
        EnvelopeKind::OpenAiChat,
        EnvelopeKind::Claude,
        EnvelopeKind::Flat,
    ];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionMetadata {
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Normalized provider answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Text extracted from the envelope. May be empty for degraded answers.
    pub text: String,
    pub confidence: f64,
    pub metadata: CompletionMetadata,
    /// Set when the answer is degraded; explains why.
    pub notice: Option<String>,
}

impl Completion {
    fn clean(text: String, confidence: f64, metadata: CompletionMetadata) -> Self {
        Self {
            text,
            confidence,
            metadata,
            notice: None,
        }
    }

    pub fn degraded(text: String, notice: impl Into<String>, metadata: CompletionMetadata) -> Self {
        Self {
            text,
            confidence: DEGRADED_CONFIDENCE,
            metadata,
            notice: Some(notice.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.notice.is_some()
    }

    /// Text to show the user: the extracted text, or the notice if there is none.
    pub fn content(&self) -> String {
        if self.text.trim().is_empty() {
            self.notice.clone().unwrap_or_default()
        } else {
            self.text.clone()
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseFailure {
    #[error("empty response body")]
    Empty,
    #[error("HTML login/portal page ({length} chars) instead of an answer")]
    PortalPage { length: usize },
    #[error("HTML document instead of an answer")]
    Html,
    #[error("provider error in response body: {0}")]
    ErrorEnvelope(String),
    #[error("unrecognized response shape")]
    UnknownShape,
}

/// Skip a byte-order mark, `<?xml ..?>` declarations and `<!-- .. -->`
/// comments in front of the first real tag.
fn skip_prolog(body: &str) -> &str {
    let mut rest = body.trim_start_matches('\u{feff}').trim_start();
    loop {
        let skipped = if let Some(after) = rest.strip_prefix("<!--") {
            after.find("-->").map(|end| &after[end + 3..])
        } else if let Some(after) = rest.strip_prefix("<?") {
            after.find("?>").map(|end| &after[end + 2..])
        } else {
            None
        };
        match skipped {
            Some(next) => rest = next.trim_start(),
            None => return rest,
        }
    }
}

fn html_failure(body: &str) -> ParseFailure {
    let length = body.chars().count();
    if length > PORTAL_PAGE_CHARS {
        ParseFailure::PortalPage { length }
    } else {
        ParseFailure::Html
    }
}

/// Check whether a body is an HTML document. Returns the failure if it is.
pub fn sniff_html(body: &str) -> Option<ParseFailure> {
    let rest = skip_prolog(body);
    let head: String = rest
        .chars()
        .take(HTML_SNIFF_BYTES)
        .collect::<String>()
        .to_lowercase();
    let is_html = head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || (head.starts_with('<') && {
            let lower = rest.to_lowercase();
            lower.contains("<head") || lower.contains("<body")
        });
    is_html.then(|| html_failure(body))
}

/// HTML by declared content type or by content.
pub fn response_html(response: &RawResponse) -> Option<ParseFailure> {
    let declared = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/html"));
    match sniff_html(&response.body) {
        Some(failure) => Some(failure),
        None if declared => Some(html_failure(&response.body)),
        None => None,
    }
}

/// Parse a provider response, rejecting HTML by content type as well as
/// by content.
pub fn parse_response(
    response: &RawResponse,
    preferred: Option<EnvelopeKind>,
) -> Result<Completion, ParseFailure> {
    if response.body.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    if let Some(html) = response_html(response) {
        return Err(html);
    }
    parse_body(&response.body, preferred)
}

/// Parse a response body, trying `preferred` first and then every other shape.
pub fn parse_body(body: &str, preferred: Option<EnvelopeKind>) -> Result<Completion, ParseFailure> {
    if body.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    if let Some(html) = sniff_html(body) {
        return Err(html);
    }

    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) => {
            return Ok(Completion::clean(
                body.trim().to_string(),
                LOOSE_CONFIDENCE,
                CompletionMetadata::default(),
            ))
        }
    };

    parse_value(&json, preferred, 0)
}

fn parse_value(
    json: &Value,
    preferred: Option<EnvelopeKind>,
    depth: usize,
) -> Result<Completion, ParseFailure> {
    if let Value::String(text) = json {
        if text.trim().is_empty() {
            return Err(ParseFailure::Empty);
        }
        if let Some(html) = sniff_html(text) {
            return Err(html);
        }
        return Ok(Completion::clean(
            text.trim().to_string(),
            LOOSE_CONFIDENCE,
            CompletionMetadata::default(),
        ));
    }

    let order = preferred
        .into_iter()
        .chain(EnvelopeKind::ORDER.into_iter().filter(|k| Some(*k) != preferred));
    for kind in order {
        let parsed = match kind {
            EnvelopeKind::Gemini => parse_gemini(json),
            EnvelopeKind::OpenAiChat => parse_openai(json),
            EnvelopeKind::Claude => parse_claude(json),
            EnvelopeKind::Flat => parse_flat(json, depth),
        };
        if let Some(completion) = parsed {
            return Ok(completion);
        }
    }

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("unspecified error");
        return Err(ParseFailure::ErrorEnvelope(message.to_string()));
    }
    Err(ParseFailure::UnknownShape)
}

fn parse_gemini(json: &Value) -> Option<Completion> {
    let candidates = json.get("candidates").and_then(Value::as_array);
    let block_reason = json
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str);
    if candidates.is_none() && block_reason.is_none() {
        return None;
    }

    let mut metadata = CompletionMetadata {
        model: str_field(json, "modelVersion"),
        input_tokens: json.pointer("/usageMetadata/promptTokenCount").and_then(Value::as_u64),
        output_tokens: json
            .pointer("/usageMetadata/candidatesTokenCount")
            .and_then(Value::as_u64),
        ..Default::default()
    };

    if let Some(reason) = block_reason {
        return Some(Completion::degraded(
            String::new(),
            format!("The provider blocked this image ({reason})."),
            metadata,
        ));
    }

    let first = candidates.and_then(|c| c.first());
    let text = first
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let finish = first.and_then(|c| str_field(c, "finishReason"));
    metadata.finish_reason = finish.clone();

    let notice = match finish.as_deref() {
        Some("MAX_TOKENS") => Some(truncation_notice()),
        Some(
            reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
            | "IMAGE_SAFETY"),
        ) => Some(format!("The provider stopped the answer ({reason}).")),
        _ if text.trim().is_empty() => Some("The provider returned no text.".to_string()),
        _ => None,
    };
    Some(finish_completion(text, notice, metadata))
}

fn parse_openai(json: &Value) -> Option<Completion> {
    let choice = json.get("choices")?.as_array()?.first();
    let metadata_base = CompletionMetadata {
        model: str_field(json, "model"),
        input_tokens: json.pointer("/usage/prompt_tokens").and_then(Value::as_u64),
        output_tokens: json.pointer("/usage/completion_tokens").and_then(Value::as_u64),
        ..Default::default()
    };
    let Some(choice) = choice else {
        return Some(Completion::degraded(
            String::new(),
            "The provider returned no choices.",
            metadata_base,
        ));
    };

    let text = match choice.pointer("/message/content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => choice
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };
    let finish = str_field(choice, "finish_reason");
    let metadata = CompletionMetadata {
        finish_reason: finish.clone(),
        ..metadata_base
    };
    let notice = match finish.as_deref() {
        Some("length") => Some(truncation_notice()),
        Some("content_filter") => Some("The provider's content filter stopped the answer.".to_string()),
        _ if text.trim().is_empty() => Some("The provider returned no text.".to_string()),
        _ => None,
    };
    Some(finish_completion(text, notice, metadata))
}

fn parse_claude(json: &Value) -> Option<Completion> {
    let blocks = json.get("content")?.as_array()?;
    let texts: Vec<&str> = blocks
        .iter()
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() && !blocks.is_empty() {
        return None;
    }
    let finish = str_field(json, "stop_reason");
    let metadata = CompletionMetadata {
        model: str_field(json, "model"),
        finish_reason: finish.clone(),
        input_tokens: json.pointer("/usage/input_tokens").and_then(Value::as_u64),
        output_tokens: json.pointer("/usage/output_tokens").and_then(Value::as_u64),
    };
    let text = texts.join("");
    let notice = match finish.as_deref() {
        Some("max_tokens") => Some(truncation_notice()),
        Some("refusal") => Some("The provider refused to answer.".to_string()),
        _ if text.trim().is_empty() => Some("The provider returned no text.".to_string()),
        _ => None,
    };
    Some(finish_completion(text, notice, metadata))
}

fn parse_flat(json: &Value, depth: usize) -> Option<Completion> {
    let object = json.as_object()?;
    for key in FLAT_KEYS {
        match object.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                if sniff_html(text).is_some() {
                    continue;
                }
                let metadata = CompletionMetadata {
                    model: str_field(json, "model"),
                    ..Default::default()
                };
                return Some(Completion::clean(text.trim().to_string(), LOOSE_CONFIDENCE, metadata));
            }
            // Relays sometimes wrap a vendor envelope one level down.
            Some(nested @ Value::Object(_)) if depth == 0 => {
                if let Ok(completion) = parse_value(nested, None, depth + 1) {
                    return Some(completion);
                }
            }
            _ => {}
        }
    }
    None
}

fn finish_completion(text: String, notice: Option<String>, metadata: CompletionMetadata) -> Completion {
    match notice {
        Some(notice) => Completion::degraded(text, notice, metadata),
        None => Completion::clean(text, DEFAULT_CONFIDENCE, metadata),
    }
}

fn truncation_notice() -> String {
    "The answer was cut off at the provider's output limit; the text may be incomplete.".to_string()
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(|s| s.to_string())
}

/// Trim the answer and strip a single code fence wrapping all of it.
///
/// Returns the cleaned text and, when a fence was removed, the original.
pub fn clean_content(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim();
    match strip_code_fence(trimmed) {
        Some(inner) => (inner.to_string(), Some(raw.to_string())),
        None => (trimmed.to_string(), None),
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;
    // Drop the language tag on the opening line.
    let body = match inner.find('\n') {
        Some(idx) if !inner[..idx].trim().contains(' ') => &inner[idx + 1..],
        _ => inner,
    };
    if body.contains("```") {
        return None;
    }
    Some(body.trim())
}
