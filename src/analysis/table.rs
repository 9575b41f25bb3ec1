//! Table analyzer — turns recognized tabular text into headers + rows.

use async_trait::async_trait;

use super::heuristics::{self, Delimiter};
use super::types::{AnalysisResult, TableAnalysis};
use super::{AnalysisKind, Analyzer, AnalyzerError};

#[derive(Debug, Default, Clone, Copy)]
pub struct TableAnalyzer;

impl TableAnalyzer {
    pub fn parse(text: &str) -> Result<TableAnalysis, AnalyzerError> {
        let delimiter = heuristics::detect_delimiter(text)
            .ok_or_else(|| AnalyzerError::NoStructure("no column delimiter found".into()))?;

        let mut lines = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter(|l| !heuristics::is_separator_row(l))
            // Prose around a Markdown table has no pipes.
            .filter(|l| delimiter != Delimiter::Pipe || l.contains('|'));

        let headers = lines
            .next()
            .map(|l| heuristics::split_cells(l, delimiter))
            .ok_or_else(|| AnalyzerError::NoStructure("empty table".into()))?;
        let mut rows: Vec<Vec<String>> = lines
            .map(|l| heuristics::split_cells(l, delimiter))
            .collect();

        if rows.is_empty() {
            return Err(AnalyzerError::NoStructure("table has no data rows".into()));
        }

        let column_count = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        for row in &mut rows {
            row.resize(column_count, String::new());
        }
        let mut headers = headers;
        headers.resize(column_count, String::new());

        Ok(TableAnalysis {
            headers,
            rows,
            column_count,
        })
    }
}

#[async_trait]
impl Analyzer for TableAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Table
    }

    async fn analyze(&self, text: &str) -> Result<AnalysisResult, AnalyzerError> {
        Self::parse(text).map(AnalysisResult::Table)
    }
}
