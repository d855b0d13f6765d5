//! Core types: the rendered-table abstraction and the records built from it.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::params::SearchParameters;

/// A hyperlink found inside a table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute target URL (or the raw `href` if it could not be resolved).
    pub url: String,
    /// Visible link text, trimmed.
    pub text: String,
}

/// One rendered table cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    pub links: Vec<Link>,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }

    pub fn with_link(text: impl Into<String>, url: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            links: vec![Link {
                url: url.into(),
                text: text.clone(),
            }],
            text,
        }
    }
}

/// One rendered table row: ordered cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<Cell>,
}

impl TableRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Row built from plain cell texts, no links.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: texts.into_iter().map(Cell::text).collect(),
        }
    }

    /// Concatenated text of every cell, unnormalised.
    pub fn raw_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// First link in the row, scanning cells left to right.
    pub fn first_link(&self) -> Option<&Link> {
        self.cells.iter().find_map(|c| c.links.first())
    }
}

/// A rendered results table: header labels plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

/// A table row turned into structured data, before provenance is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRow {
    /// Header label → cell text, in column order. Empty cells are omitted.
    pub fields: IndexMap<String, String>,
    /// Whitespace-collapsed text of the whole row. Also the dedup key.
    pub full_text: String,
    pub has_link: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_text: Option<String>,
}

/// Where and how a record was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub strategy_id: String,
    /// Human description of the originating strategy.
    pub strategy: String,
    /// Literal term submitted by that strategy.
    pub term: String,
    pub weight: f64,
    pub extracted_at: DateTime<Utc>,
    pub source: String,
    /// Full parameter set submitted by the strategy.
    pub parameters: SearchParameters,
}

/// Outcome of visiting a record's detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailOutcome {
    pub extracted: bool,
    /// Every configured field on success (value may be the sentinel);
    /// empty on failure.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetailOutcome {
    pub fn success(fields: IndexMap<String, String>) -> Self {
        Self {
            extracted: true,
            fields,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            extracted: false,
            fields: IndexMap::new(),
            error: Some(error.into()),
        }
    }
}

/// The canonical output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub row: ExtractedRow,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailOutcome>,
}

impl Record {
    /// Detail URL if the record links to an absolute `http(s)` page.
    pub fn fetchable_detail_url(&self) -> Option<&str> {
        let url = self.row.detail_url.as_deref()?;
        let parsed = url::Url::parse(url).ok()?;
        matches!(parsed.scheme(), "http" | "https").then_some(url)
    }

    pub fn weight(&self) -> f64 {
        self.provenance.weight
    }
}
