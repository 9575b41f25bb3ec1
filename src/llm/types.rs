//! Request and result types for the recognition pipeline.
//!
//! Serialized field names are camelCase so results can be handed to a
//! web front end or history store without remapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;

/// Recognition category. `Auto` is only meaningful on a request; the other
/// variants double as the classification taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    #[default]
    Auto,
    Document,
    Handwriting,
    Receipt,
    Id,
    Table,
    Ancient,
    PromptGen,
    Formula,
    Code,
    Chart,
    Screenshot,
    Other,
}

impl Category {
    /// The 11 concrete classes offered to the classifier, plus `Other`.
    pub const TAXONOMY: [Category; 12] = [
        Category::Document,
        Category::Handwriting,
        Category::Receipt,
        Category::Id,
        Category::Table,
        Category::Ancient,
        Category::PromptGen,
        Category::Formula,
        Category::Code,
        Category::Chart,
        Category::Screenshot,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Auto => "auto",
            Category::Document => "document",
            Category::Handwriting => "handwriting",
            Category::Receipt => "receipt",
            Category::Id => "id",
            Category::Table => "table",
            Category::Ancient => "ancient",
            Category::PromptGen => "promptGen",
            Category::Formula => "formula",
            Category::Code => "code",
            Category::Chart => "chart",
            Category::Screenshot => "screenshot",
            Category::Other => "other",
        }
    }

    /// Match a classifier token, accepting the synonyms models tend to use.
    ///
    /// A contraction ("I'd", "it's") never matches.
    pub fn from_token(token: &str) -> Option<Category> {
        let trimmed = token.trim().trim_matches(|c: char| !c.is_alphanumeric());
        if trimmed.contains(['\'', '\u{2019}']) {
            return None;
        }
        let normalized: String = trimmed
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        let category = match normalized.as_str() {
            "document" | "doc" | "text" | "printed" => Category::Document,
            "handwriting" | "handwritten" => Category::Handwriting,
            "receipt" | "invoice" | "shoppingreceipt" | "bill" => Category::Receipt,
            "id" | "idcard" | "identity" | "identitydocument" | "passport" => Category::Id,
            "table" | "tabular" | "spreadsheet" => Category::Table,
            "ancient" | "historical" | "historicaltext" | "classical" => Category::Ancient,
            "promptgen" | "prompt" | "artwork" | "art" | "illustration" | "painting" => {
                Category::PromptGen
            }
            "formula" | "math" | "equation" => Category::Formula,
            "code" | "sourcecode" => Category::Code,
            "chart" | "graph" | "diagram" => Category::Chart,
            "screenshot" | "ui" => Category::Screenshot,
            "other" | "unknown" => Category::Other,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Category::Auto);
        }
        Category::from_token(s).ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// Image payload as received from the upload collaborator.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Original file name, forwarded to the history sink.
    pub source_name: Option<String>,
}

impl ImageInput {
    /// Wrap raw bytes, sniffing the MIME type from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = sniff_mime_type(&bytes);
        Self {
            bytes,
            mime_type,
            source_name: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// MIME type from magic bytes; JPEG when the format is not recognized.
pub fn sniff_mime_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "image/jpeg".to_string())
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub image: ImageInput,
    pub category: Category,
    pub override_prompt: Option<String>,
}

impl RecognitionRequest {
    pub fn new(image: ImageInput, category: Category) -> Self {
        Self {
            image,
            category,
            override_prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.override_prompt = Some(prompt.into());
        self
    }
}

/// A follow-up the front end can offer for a detected category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedOption {
    pub id: String,
    pub label: String,
}

/// Output of the classification gate. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub detected_type: Category,
    /// 0–100.
    pub confidence: u8,
    pub rationale: String,
    pub optimized_prompt: String,
    pub needs_language_post_processing: bool,
    pub suggested_options: Vec<SuggestedOption>,
}

/// Terminal value of a recognition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub content: String,
    /// Raw provider text, present only when `content` was cleaned up.
    pub original_content: Option<String>,
    pub confidence: f64,
    pub model_used: String,
    pub provider_used: String,
    pub classification: Option<ClassificationResult>,
    pub special_analysis: Option<AnalysisResult>,
    /// Explanation attached to degraded (truncated, blocked) answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}
