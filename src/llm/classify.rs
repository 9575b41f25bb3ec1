//! Classification gate — detect the content category before recognition.
//!
//! Two short calls against the same image:
//! 1. taxonomy prompt → one category token
//! 2. `score|rationale` → confidence (defaults to 80 when unreadable)
//!
//! Classification is an optimization. The gate returns `Err` on any
//! failure and the pipeline carries on with the generic prompt.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::dialect::TokenBudget;
use super::prompts::{self, CLASSIFY_TAXONOMY_PROMPT};
use super::session::Completer;
use super::types::{Category, ClassificationResult};
use crate::error::RecognitionError;

/// Confidence used when the score answer cannot be parsed.
pub const DEFAULT_CLASSIFICATION_CONFIDENCE: u8 = 80;

static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}").unwrap());

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classification call failed: {0}")]
    Call(#[from] RecognitionError),
    #[error("classification answer unusable: {0}")]
    Degraded(String),
}

/// Whether a request goes through the gate at all.
pub fn applies(category: Category, override_prompt: Option<&str>) -> bool {
    category == Category::Auto && override_prompt.is_none()
}

pub async fn classify(
    completer: &mut dyn Completer,
) -> Result<ClassificationResult, ClassificationError> {
    let start = std::time::Instant::now();

    let answer = completer
        .complete(CLASSIFY_TAXONOMY_PROMPT, TokenBudget::Classification)
        .await?;
    if let Some(notice) = answer.notice {
        return Err(ClassificationError::Degraded(notice));
    }
    let detected = parse_category(&answer.text);
    log::info!("[CLASSIFY] Category: {} (raw: {:?})", detected, answer.text.trim());

    let scored = completer
        .complete(
            &prompts::build_confidence_prompt(detected),
            TokenBudget::Classification,
        )
        .await?;
    let (confidence, rationale) = parse_score(&scored.text);
    log::info!(
        "[CLASSIFY] Confidence: {} in {}ms",
        confidence,
        start.elapsed().as_millis()
    );

    Ok(ClassificationResult {
        detected_type: detected,
        confidence,
        rationale,
        optimized_prompt: prompts::prompt_for(detected).to_string(),
        needs_language_post_processing: prompts::needs_language_post_processing(detected),
        suggested_options: prompts::suggested_options(detected),
    })
}

/// Category named by a classifier answer; `Other` if none.
///
/// The whole answer is tried first, then taxonomy names anywhere in it,
/// then synonyms. Contractions are kept whole so "I'd" is not read as `id`.
pub fn parse_category(answer: &str) -> Category {
    if let Some(category) = Category::from_token(answer) {
        return category;
    }

    let words: Vec<&str> = answer
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '\'' | '\u{2019}')))
        .filter(|word| !word.is_empty())
        .collect();

    words
        .iter()
        .find_map(|word| taxonomy_name(word))
        .or_else(|| {
            words
                .iter()
                .filter_map(|word| Category::from_token(word))
                .find(|category| *category != Category::Other)
        })
        .unwrap_or(Category::Other)
}

/// Exact taxonomy name, ignoring case, `_` and `-`. `other` is left to the
/// fallback so it cannot outrank a real category later in the sentence.
fn taxonomy_name(word: &str) -> Option<Category> {
    let normalized = word.to_lowercase().replace(['_', '-'], "");
    Category::TAXONOMY
        .into_iter()
        .filter(|category| *category != Category::Other)
        .find(|category| category.as_str().to_lowercase() == normalized)
}

/// Parse `score|rationale`. Unreadable scores fall back to 80.
pub fn parse_score(answer: &str) -> (u8, String) {
    let answer = answer.trim();
    let (head, rationale) = match answer.split_once('|') {
        Some((head, tail)) => (head, tail.trim().to_string()),
        None => (answer, String::new()),
    };

    let score = SCORE_RE
        .find(head)
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|n| n.min(100) as u8);

    match score {
        Some(score) => (score, rationale),
        None => {
            let rationale = if rationale.is_empty() {
                answer.to_string()
            } else {
                rationale
            };
            (DEFAULT_CLASSIFICATION_CONFIDENCE, rationale)
        }
    }
}
