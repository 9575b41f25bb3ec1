//! Post-analysis domain — category-specific extraction on recognized text.
//!
//! The dispatcher picks at most one analyzer per request: the explicitly
//! requested category is consulted first, then the detected one. Analyzer
//! failures never fail a recognition; they are logged and the result
//! simply carries no `special_analysis`.
//!
//! Built in:
//!   - table.rs   — delimiter/column heuristics (heuristics.rs)
//!   - receipt.rs — regex line items and totals
//!
//! ID documents, historical text and artwork prompts are external
//! analyzers registered through `AnalyzerSet::with`.

pub mod heuristics;
pub mod receipt;
pub mod table;
pub mod types;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::types::Category;

pub use receipt::ReceiptAnalyzer;
pub use table::TableAnalyzer;
pub use types::{
    AnalysisResult, AncientTextAnalysis, IdDocumentAnalysis, IdField, LineItem, PromptAnalysis,
    ReceiptAnalysis, TableAnalysis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Receipt,
    IdDocument,
    Table,
    Ancient,
    Prompt,
}

impl AnalysisKind {
    /// Fixed category → analyzer mapping.
    pub fn for_category(category: Category) -> Option<Self> {
        match category {
            Category::Receipt => Some(AnalysisKind::Receipt),
            Category::PromptGen => Some(AnalysisKind::Prompt),
            Category::Id => Some(AnalysisKind::IdDocument),
            Category::Table => Some(AnalysisKind::Table),
            Category::Ancient => Some(AnalysisKind::Ancient),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisKind::Receipt => "receipt",
            AnalysisKind::IdDocument => "id-document",
            AnalysisKind::Table => "table",
            AnalysisKind::Ancient => "ancient-text",
            AnalysisKind::Prompt => "prompt",
        })
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("{0}")]
    NoStructure(String),
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// A category-specific analyzer. Receives the full recognized text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalysisKind;

    async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalyzerError>;
}

/// Immutable kind → analyzer mapping, built once and injected into the
/// recognizer.
#[derive(Clone, Default)]
pub struct AnalyzerSet {
    analyzers: HashMap<AnalysisKind, Arc<dyn Analyzer>>,
}

impl AnalyzerSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table and receipt analyzers.
    pub fn builtin() -> Self {
        Self::empty().with(TableAnalyzer).with(ReceiptAnalyzer)
    }

    /// Register an analyzer under its own kind, replacing any previous one.
    pub fn with(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzers.insert(analyzer.kind(), Arc::new(analyzer));
        self
    }

    pub fn get(&self, kind: AnalysisKind) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Explicit category first, then the detected one. `Auto` never maps.
    pub fn select(
        &self,
        requested: Category,
        detected: Option<Category>,
    ) -> Option<Arc<dyn Analyzer>> {
        std::iter::once(requested)
            .chain(detected)
            .filter_map(AnalysisKind::for_category)
            .find_map(|kind| self.get(kind))
    }

    /// Run the selected analyzer, if any. Failures are logged and dropped.
    pub async fn dispatch(
        &self,
        requested: Category,
        detected: Option<Category>,
        text: &str,
    ) -> Option<AnalysisResult> {
        if text.trim().is_empty() {
            return None;
        }
        let analyzer = self.select(requested, detected)?;
        let kind = analyzer.kind();
        let start = std::time::Instant::now();

        match analyzer.analyze(text).await {
            Ok(result) => {
                log::info!(
                    "[ANALYZE] {} analysis in {}ms",
                    kind,
                    start.elapsed().as_millis()
                );
                Some(result)
            }
            Err(e) => {
                log::warn!("[ANALYZE] {} analyzer failed: {}", kind, e);
                None
            }
        }
    }
}
