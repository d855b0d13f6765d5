//! Search strategy generation.
//!
//! A run submits the same request several times with different
//! formulations of the product term. Each [`Strategy`] carries its term,
//! the full parameter set to submit, and a weight used only for the final
//! ordering of records. The list order is execution order.

pub mod synonyms;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::SearchParameters;

pub use synonyms::{BuiltinSynonyms, FileSynonyms, SynonymProvider, SynonymTable};

/// Suffix appended by the chemical-name transform when the term has no entry.
pub const CHEMICAL_SUFFIX: &str = "sódica";

/// The kinds of term formulation a run can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Term exactly as supplied.
    Direct,
    /// Chemical denomination of the term.
    ChemicalName,
    /// Active ingredient (INN) of the term.
    ActiveIngredient,
    /// First word only, with a relevance post-filter.
    Broad,
    /// Caller-supplied alternative term.
    Custom,
}

impl StrategyKind {
    /// Stable identifier used in provenance and reports.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ChemicalName => "chemical_name",
            Self::ActiveIngredient => "active_ingredient",
            Self::Broad => "broad",
            Self::Custom => "custom",
        }
    }

    /// Weight of records found by this kind of strategy, in `(0, 1]`.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Direct => 1.0,
            Self::ChemicalName => 0.9,
            Self::ActiveIngredient => 0.8,
            Self::Broad => 0.7,
            Self::Custom => 0.6,
        }
    }

    /// The fixed strategies every run starts with, in execution order.
    pub fn base() -> &'static [StrategyKind] {
        &[
            Self::Direct,
            Self::ChemicalName,
            Self::ActiveIngredient,
            Self::Broad,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Direct => "Direct search for the supplied term",
            Self::ChemicalName => "Search by chemical denomination",
            Self::ActiveIngredient => "Search by active ingredient (INN)",
            Self::Broad => "Broad search with post-filtering",
            Self::Custom => "Custom search",
        }
    }

    /// Apply this kind's term transform. Total over any non-empty term.
    pub fn transform(&self, term: &str, synonyms: &dyn SynonymProvider) -> String {
        match self {
            Self::Direct | Self::Custom => term.to_string(),
            Self::ChemicalName => synonyms
                .alternates(SynonymTable::ChemicalName, term)
                .into_iter()
                .next()
                .unwrap_or_else(|| format!("{term} {CHEMICAL_SUFFIX}")),
            Self::ActiveIngredient => synonyms
                .alternates(SynonymTable::ActiveIngredient, term)
                .into_iter()
                .next()
                .unwrap_or_else(|| term.to_string()),
            Self::Broad => term.split_whitespace().next().unwrap_or(term).to_string(),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One formulation of the search, ready to submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub description: String,
    /// Literal term submitted in the product field.
    pub term: String,
    pub weight: f64,
    /// Records must also contain the original product term to be kept.
    pub post_filter: bool,
    /// Parameters to submit; identical to the request except the product term.
    pub parameters: SearchParameters,
}

impl Strategy {
    fn new(kind: StrategyKind, description: String, term: String, params: &SearchParameters) -> Self {
        Self {
            kind,
            description,
            parameters: params.with_product_term(&term),
            term,
            weight: kind.weight(),
            post_filter: kind == StrategyKind::Broad,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

/// Generate the strategy list using the built-in synonym tables.
pub fn generate_strategies(params: &SearchParameters) -> Vec<Strategy> {
    generate_strategies_with(params, &BuiltinSynonyms)
}

/// Generate the strategy list, resolving synonyms through `synonyms`.
///
/// Always yields the four base strategies, then one custom strategy per
/// extra term. The product term must be non-empty; [`SearchInput::normalize`]
/// guarantees this.
///
/// [`SearchInput::normalize`]: crate::params::SearchInput::normalize
pub fn generate_strategies_with(
    params: &SearchParameters,
    synonyms: &dyn SynonymProvider,
) -> Vec<Strategy> {
    let term = params.product_term.as_str();
    let mut strategies: Vec<Strategy> = StrategyKind::base()
        .iter()
        .map(|&kind| {
            let transformed = kind.transform(term, synonyms);
            Strategy::new(kind, kind.description().to_string(), transformed, params)
        })
        .collect();

    for extra in &params.extra_terms {
        strategies.push(Strategy::new(
            StrategyKind::Custom,
            format!("{}: {extra}", StrategyKind::Custom.description()),
            extra.clone(),
            params,
        ));
    }

    tracing::debug!(count = strategies.len(), "search strategies generated");
    strategies
}
