//! Layout-based table detection over native page text.
//!
//! Consecutive tabular lines form a candidate table; a candidate is kept
//! only when it has at least two rows. Detection never fails outwards:
//! a candidate that fails is dropped on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum rows for a candidate to count as a table.
pub const MIN_TABLE_ROWS: usize = 2;

/// Candidates longer than this are layout noise, not tables.
pub const MAX_TABLE_ROWS: usize = 500;

static SPACE_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {3,}").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableExtractionError {
    #[error("Table candidate on page {page} has {rows} rows, over the row limit")]
    TooManyRows { page: usize, rows: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// 1-based source page.
    pub page_number: usize,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TableExtractor;

impl TableExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Tables found on one page. Never errors: a candidate that cannot be
    /// turned into a table is skipped and the rest of the page still counts.
    pub fn extract(&self, page_number: usize, text: &str) -> Vec<Table> {
        candidates(text)
            .into_iter()
            .filter_map(|rows| match into_table(page_number, rows) {
                Ok(table) => table,
                Err(e) => {
                    tracing::debug!(page = page_number, error = %e, "Table candidate skipped");
                    None
                }
            })
            .collect()
    }

    /// Tables across all pages, in page order.
    pub fn extract_document<S: AsRef<str>>(&self, pages: &[S]) -> Vec<Table> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(i, text)| self.extract(i + 1, text.as_ref()))
            .collect()
    }
}

/// Runs of consecutive tabular lines, split into cells.
fn candidates(text: &str) -> Vec<Vec<Vec<String>>> {
    let mut runs = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        if is_tabular_line(line) {
            current.push(split_cells(line));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// `None` for runs too short to be a table.
fn into_table(
    page_number: usize,
    rows: Vec<Vec<String>>,
) -> Result<Option<Table>, TableExtractionError> {
    if rows.len() > MAX_TABLE_ROWS {
        return Err(TableExtractionError::TooManyRows {
            page: page_number,
            rows: rows.len(),
        });
    }
    Ok((rows.len() >= MIN_TABLE_ROWS).then_some(Table { page_number, rows }))
}

/// Heuristic: a line looks tabular if it has multiple columns separated by
/// tabs, pipes, or multi-space gaps.
///
/// Patterns detected:
/// - Tab-separated: "Name\tPAN\tCommitment"
/// - Pipe-separated: "Name | PAN | Commitment"
/// - Multi-space aligned: "A. Sharma    ABCDE1234F    Rs. 25,00,000"
fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 5 {
        return false;
    }

    if trimmed.matches('\t').count() >= 2 {
        return true;
    }
    if trimmed.matches('|').count() >= 2 {
        return true;
    }
    count_multi_space_gaps(trimmed) >= 2
}

/// Count runs of 3+ consecutive spaces that separate non-empty text segments.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut in_gap = false;
    let mut gap_len = 0;

    for ch in text.chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len >= 3 && !in_gap {
                in_gap = true;
                count += 1;
            }
        } else {
            in_gap = false;
            gap_len = 0;
        }
    }

    count
}

/// Split a tabular line on its dominant separator.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let cells: Vec<&str> = if trimmed.matches('|').count() >= 2 {
        trimmed.split('|').collect()
    } else if trimmed.matches('\t').count() >= 2 {
        trimmed.split('\t').collect()
    } else {
        SPACE_GAP.split(trimmed).collect()
    };

    cells
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render tables as `TABLE k (Page p):` blocks of pipe-delimited rows.
pub fn flatten_tables(tables: &[Table]) -> String {
    let mut out = String::new();
    for (k, table) in tables.iter().enumerate() {
        out.push_str(&format!("TABLE {} (Page {}):\n", k + 1, table.page_number));
        for row in &table.rows {
            out.push_str(&row.join(" | "));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
