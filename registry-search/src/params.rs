//! Search request normalisation.
//!
//! [`SearchInput`] is the raw request as it arrives from a config file or
//! the command line. [`SearchInput::normalize`] turns it into the immutable
//! [`SearchParameters`] every strategy is derived from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Maximum accepted length of the product term, in characters.
pub const MAX_TERM_CHARS: usize = 100;

/// Result cap used when the request does not name one.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Hard ceiling on the result cap.
pub const MAX_RESULTS_CEILING: usize = 1000;

/// Holder identifiers (CNPJ) are exactly this many digits.
const HOLDER_ID_DIGITS: usize = 14;

/// Exclusion terms applied to every run, before any caller-supplied terms.
///
/// They drop combination products from the results. Matching is a
/// case-insensitive substring test, so short entries such as `"+"` and
/// `"com"` match widely.
pub const BASE_EXCLUSIONS: &[&str] = &[
    "cafeína",
    "orfenadrina",
    "prometazina",
    "adifenina",
    "pitofenona",
    "associação",
    "composta",
    "combinação",
    "novalgina composta",
    "+",
    "com",
];

/// Regularization category searched in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegularizationType {
    /// Registered medicines.
    #[default]
    Registered,
    /// Notified medicines.
    Notified,
}

impl RegularizationType {
    /// Label the registry form uses for this category.
    pub fn form_label(&self) -> &'static str {
        match self {
            Self::Registered => "MEDICAMENTO REGISTRADO",
            Self::Notified => "MEDICAMENTO NOTIFICADO",
        }
    }
}

/// Regularization status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Only active regularizations.
    #[default]
    Active,
    /// Only inactive regularizations.
    Inactive,
    /// No status filter; the status control is left untouched.
    Both,
}

/// Raw search request. Every field except `product_term` has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchInput {
    /// Product name, or part of it. Mandatory.
    pub product_term: Option<String>,
    /// Regularization category (default: registered).
    pub regularization: Option<RegularizationType>,
    /// Holder company identifier (CNPJ), punctuation allowed.
    pub holder_id: Option<String>,
    /// Regularization date, `DD/MM/YYYY`.
    pub registration_date: Option<String>,
    /// Status filter (default: active).
    pub status: Option<StatusFilter>,
    /// Result cap per strategy (default 100, ceiling 1000).
    pub max_results: Option<usize>,
    /// Whether to visit each record's detail page (default: true).
    pub include_details: Option<bool>,
    /// Alternative terms, each becoming one custom strategy.
    pub extra_terms: Vec<String>,
    /// Additional exclusion terms, merged with [`BASE_EXCLUSIONS`].
    pub exclusion_terms: Vec<String>,
}

/// Normalised, validated search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub product_term: String,
    pub regularization: RegularizationType,
    pub holder_id: Option<String>,
    pub registration_date: Option<String>,
    pub status: StatusFilter,
    pub max_results: usize,
    pub include_details: bool,
    pub extra_terms: Vec<String>,
    pub exclusion_terms: Vec<String>,
}

impl SearchInput {
    /// Convenience constructor for a request with only a product term.
    pub fn for_term(term: impl Into<String>) -> Self {
        Self {
            product_term: Some(term.into()),
            ..Default::default()
        }
    }

    /// Validate and normalise this request.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] if the product term is missing or
    /// blank. Malformed optional values (holder identifier, date) are dropped
    /// with a warning instead.
    pub fn normalize(&self) -> Result<SearchParameters> {
        let term = self
            .product_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SearchError::Validation("product_term is required".into()))?;
        let product_term: String = term.chars().take(MAX_TERM_CHARS).collect();

        let max_results = match self.max_results {
            Some(0) | None => DEFAULT_MAX_RESULTS,
            Some(n) => n.min(MAX_RESULTS_CEILING),
        };

        let params = SearchParameters {
            product_term,
            regularization: self.regularization.unwrap_or_default(),
            holder_id: normalize_holder_id(self.holder_id.as_deref()),
            registration_date: normalize_date(self.registration_date.as_deref()),
            status: self.status.unwrap_or_default(),
            max_results,
            include_details: self.include_details.unwrap_or(true),
            extra_terms: self
                .extra_terms
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            exclusion_terms: merge_exclusions(BASE_EXCLUSIONS.iter().copied(), &self.exclusion_terms),
        };

        tracing::debug!(
            term = %params.product_term,
            max_results = params.max_results,
            exclusions = params.exclusion_terms.len(),
            "search parameters normalised"
        );
        Ok(params)
    }
}

impl SearchParameters {
    /// Copy of these parameters with a different product term.
    ///
    /// Strategies use this so each one submits its own term with otherwise
    /// identical filters.
    pub fn with_product_term(&self, term: &str) -> Self {
        Self {
            product_term: term.to_string(),
            ..self.clone()
        }
    }
}

/// Keep only the digits; drop the identifier unless exactly 14 remain.
fn normalize_holder_id(raw: Option<&str>) -> Option<String> {
    let digits: String = raw?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() != HOLDER_ID_DIGITS {
        tracing::warn!(
            digits = digits.len(),
            "holder identifier looks invalid, continuing without it"
        );
        return None;
    }
    Some(digits)
}

fn normalize_date(raw: Option<&str>) -> Option<String> {
    let date = raw?.trim();
    if date.is_empty() {
        return None;
    }
    if NaiveDate::parse_from_str(date, "%d/%m/%Y").is_err() {
        tracing::warn!(date, "registration date is not DD/MM/YYYY, continuing without it");
        return None;
    }
    Some(date.to_string())
}

/// Union of base and caller terms, case-insensitive, base order first.
fn merge_exclusions<'a>(
    base: impl Iterator<Item = &'a str>,
    extra: &'a [String],
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for term in base.chain(extra.iter().map(String::as_str)) {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let folded = term.to_lowercase();
        if !merged.iter().any(|t| t.to_lowercase() == folded) {
            merged.push(term.to_string());
        }
    }
    merged
}
