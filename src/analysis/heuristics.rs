//! Layout heuristics for recognized text.
//!
//! Detects which column delimiter a block of text uses and splits lines
//! into cells. Used by the table analyzer; works on whatever the model
//! produced (Markdown tables, TSV, space-aligned columns).

/// How the columns of a text table are separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Pipe,
    Tab,
    /// Two or more consecutive spaces.
    AlignedSpaces,
}

fn content_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Returns the delimiter used by more than half of the non-empty lines.
///
/// Pipes win over tabs, tabs over aligned whitespace. Needs at least two
/// lines.
pub fn detect_delimiter(text: &str) -> Option<Delimiter> {
    let lines = content_lines(text);
    if lines.len() < 2 {
        return None;
    }
    let total = lines.len();

    let pipe_lines = lines.iter().filter(|l| l.contains('|')).count();
    if pipe_lines > total / 2 {
        return Some(Delimiter::Pipe);
    }

    let tab_lines = lines.iter().filter(|l| l.contains('\t')).count();
    if tab_lines > total / 2 {
        return Some(Delimiter::Tab);
    }

    // Aligned columns: gap starts within 2 chars of a gap in the first line.
    let gaps: Vec<Vec<usize>> = lines.iter().map(|l| wide_gap_positions(l)).collect();
    let first = gaps.first().filter(|g| !g.is_empty())?;
    let aligned = gaps
        .iter()
        .filter(|positions| {
            positions
                .iter()
                .any(|p| first.iter().any(|fp| p.abs_diff(*fp) <= 2))
        })
        .count();
    if aligned > total / 2 {
        return Some(Delimiter::AlignedSpaces);
    }

    None
}

/// Byte offsets where runs of 2+ spaces start (leading indent excluded).
fn wide_gap_positions(line: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut run_start = None;
    let mut run_len = 0;
    for (i, ch) in line.char_indices() {
        if ch == ' ' {
            if run_start.is_none() {
                run_start = Some(i);
            }
            run_len += 1;
        } else {
            if let Some(start) = run_start.take() {
                if start > 0 && run_len >= 2 {
                    positions.push(start);
                }
            }
            run_len = 0;
        }
    }
    positions
}

/// True for Markdown header separators such as `|---|:--:|`.
pub fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '+'))
}

/// Split one line into trimmed cells.
pub fn split_cells(line: &str, delimiter: Delimiter) -> Vec<String> {
    match delimiter {
        Delimiter::Pipe => {
            let trimmed = line.trim();
            let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            inner.split('|').map(|c| c.trim().to_string()).collect()
        }
        Delimiter::Tab => line.split('\t').map(|c| c.trim().to_string()).collect(),
        Delimiter::AlignedSpaces => line
            .trim()
            .split("  ")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
