//! Receipt analyzer — regex extraction of line items and totals.
//!
//! Works line by line on the recognized text. A line ending in an amount
//! is either a summary line (subtotal/tax/total keywords) or an item.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{AnalysisResult, LineItem, ReceiptAnalysis};
use super::{AnalysisKind, Analyzer, AnalyzerError};

const SUBTOTAL_KEYWORDS: &[&str] = &["subtotal", "sub-total", "sub total", "小计"];
const TAX_KEYWORDS: &[&str] = &["tax", "vat", "gst", "税"];
const TOTAL_KEYWORDS: &[&str] = &["total", "amount due", "balance due", "合计", "总计", "应付"];
const SKIP_KEYWORDS: &[&str] = &["change", "cash", "card", "tendered", "找零", "实收"];

static AMOUNT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<label>.*?)[\s:：]*(?P<currency>[$€£¥])?\s*(?P<amount>-?\d+(?:,\d{3})*(?:\.\d{1,2})?)\s*$",
    )
    .unwrap()
});

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<qty>\d{1,3})\s*[x×@]\s+|\s+[x×@]\s*(?P<qty2>\d{1,3})$").unwrap()
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4})\b").unwrap()
});

#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiptAnalyzer;

impl ReceiptAnalyzer {
    pub fn parse(text: &str) -> Result<ReceiptAnalysis, AnalyzerError> {
        let mut receipt = ReceiptAnalysis::default();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if receipt.date.is_none() {
                if let Some(m) = DATE_RE.find(line) {
                    receipt.date = Some(m.as_str().to_string());
                }
            }

            let Some(caps) = AMOUNT_LINE_RE.captures(line) else {
                if receipt.merchant.is_none() && receipt.items.is_empty() && !DATE_RE.is_match(line) {
                    receipt.merchant = Some(line.to_string());
                }
                continue;
            };

            let label = caps["label"].trim().trim_end_matches(':').trim();
            let Some(amount) = parse_amount(&caps["amount"]) else {
                continue;
            };
            if receipt.currency.is_none() {
                receipt.currency = caps.name("currency").map(|c| c.as_str().to_string());
            }
            if label.is_empty() || DATE_RE.is_match(line) {
                continue;
            }

            let lower = label.to_lowercase();
            if contains_any(&lower, SUBTOTAL_KEYWORDS) {
                receipt.subtotal = Some(amount);
            } else if contains_any(&lower, TAX_KEYWORDS) {
                receipt.tax = Some(amount);
            } else if contains_any(&lower, TOTAL_KEYWORDS) {
                receipt.total = Some(amount);
            } else if contains_any(&lower, SKIP_KEYWORDS) {
                continue;
            } else {
                receipt.items.push(line_item(label, amount));
            }
        }

        if receipt.items.is_empty() && receipt.total.is_none() {
            return Err(AnalyzerError::NoStructure(
                "no priced lines or total found".into(),
            ));
        }
        Ok(receipt)
    }
}

fn line_item(label: &str, amount: f64) -> LineItem {
    let quantity = QUANTITY_RE.captures(label).and_then(|caps| {
        caps.name("qty")
            .or_else(|| caps.name("qty2"))
            .and_then(|m| m.as_str().parse().ok())
    });
    let description = QUANTITY_RE.replace(label, "").trim().to_string();
    LineItem {
        description,
        quantity,
        amount,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

#[async_trait]
impl Analyzer for ReceiptAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Receipt
    }

    async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalyzerError> {
        Self::parse(text).map(AnalysisResult::Receipt)
    }
}
