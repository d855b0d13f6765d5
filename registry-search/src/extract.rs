//! Table → record extraction.
//!
//! Operates on an already-rendered [`Table`]; no page access happens here.
//! Rows with fewer than two cells are treated as leftover header or
//! separator rows and skipped.

use indexmap::IndexMap;

use crate::exclusion::{check_exclusion, Exclusion};
use crate::types::{ExtractedRow, Table, TableRow};

/// Minimum number of cells for a row to count as data.
pub const MIN_DATA_CELLS: usize = 2;

/// Rows extracted from one table, plus how many were excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Kept rows, in table order, at most `cap` of them.
    pub rows: Vec<ExtractedRow>,
    /// Rows dropped by the exclusion filter.
    pub excluded: usize,
}

/// Trim and collapse every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Label for a column with no header: `column_1`, `column_2`, …
pub fn positional_label(index: usize) -> String {
    format!("column_{}", index + 1)
}

/// Extract up to `cap` rows from `table`, dropping excluded rows.
///
/// Extraction stops as soon as `cap` rows have been kept; later rows are
/// not inspected.
pub fn extract_records<S: AsRef<str>>(table: &Table, cap: usize, exclusions: &[S]) -> Extraction {
    let mut extraction = Extraction::default();

    for row in &table.rows {
        if extraction.rows.len() >= cap {
            break;
        }
        if row.cells.len() < MIN_DATA_CELLS {
            continue;
        }

        let full_text = collapse_whitespace(&row.raw_text());
        if let Exclusion::Exclude(term) = check_exclusion(&full_text, exclusions) {
            tracing::trace!(term, "row excluded");
            extraction.excluded += 1;
            continue;
        }

        extraction.rows.push(build_row(row, &table.headers, full_text));
    }

    tracing::debug!(
        kept = extraction.rows.len(),
        excluded = extraction.excluded,
        "table extracted"
    );
    extraction
}

fn build_row(row: &TableRow, headers: &[String], full_text: String) -> ExtractedRow {
    let mut fields = IndexMap::new();
    for (index, cell) in row.cells.iter().enumerate() {
        let value = cell.text.trim();
        if value.is_empty() {
            continue;
        }
        let label = headers
            .get(index)
            .filter(|h| !h.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| positional_label(index));
        fields.insert(label, value.to_string());
    }

    let link = row.first_link();
    ExtractedRow {
        fields,
        full_text,
        has_link: link.is_some(),
        detail_url: link.map(|l| l.url.clone()),
        link_text: link.map(|l| l.text.trim().to_string()),
    }
}
