//! Structured post-analysis output — one variant per analyzer kind.
//!
//! The recognizer never looks inside these; it forwards whatever the
//! matching analyzer produced.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisResult {
    Receipt(ReceiptAnalysis),
    IdDocument(IdDocumentAnalysis),
    Table(TableAnalysis),
    Ancient(AncientTextAnalysis),
    Prompt(PromptAnalysis),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Option<u32>,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptAnalysis {
    pub merchant: Option<String>,
    pub date: Option<String>,
    pub currency: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdDocumentAnalysis {
    pub document_type: Option<String>,
    pub fields: Vec<IdField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAnalysis {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncientTextAnalysis {
    pub modern_translation: Option<String>,
    pub era: Option<String>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAnalysis {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub style_tags: Vec<String>,
}
