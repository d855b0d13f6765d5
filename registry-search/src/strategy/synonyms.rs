//! Pluggable synonym resolution for term transforms.
//!
//! A [`SynonymProvider`] maps a canonical term to zero or more alternate
//! terms in a given [`SynonymTable`]. [`BuiltinSynonyms`] carries the fixed
//! tables; [`FileSynonyms`] loads the same shape from a JSON data file.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SearchError};

/// Which lookup table a transform consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynonymTable {
    /// Chemical denomination (e.g. salt form).
    ChemicalName,
    /// International non-proprietary name of the active ingredient.
    ActiveIngredient,
}

/// Resolves alternate names for a term.
pub trait SynonymProvider: Send + Sync {
    /// Alternates for `term` in `table`, best first. Lookup is
    /// case-insensitive; an empty vector means "no entry".
    fn alternates(&self, table: SynonymTable, term: &str) -> Vec<String>;
}

const CHEMICAL_NAMES: &[(&str, &str)] = &[
    ("dipirona", "dipirona sódica"),
    ("ibuprofeno", "ibuprofeno"),
    ("paracetamol", "paracetamol"),
    ("aspirina", "ácido acetilsalicílico"),
];

const ACTIVE_INGREDIENTS: &[(&str, &str)] = &[
    ("dipirona", "metamizol"),
    ("novalgina", "metamizol"),
    ("aspirina", "ácido acetilsalicílico"),
];

/// The fixed, compiled-in synonym tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSynonyms;

impl SynonymProvider for BuiltinSynonyms {
    fn alternates(&self, table: SynonymTable, term: &str) -> Vec<String> {
        let entries = match table {
            SynonymTable::ChemicalName => CHEMICAL_NAMES,
            SynonymTable::ActiveIngredient => ACTIVE_INGREDIENTS,
        };
        let key = term.to_lowercase();
        entries
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
            .collect()
    }
}

/// Synonym tables loaded from a JSON data file.
///
/// ```json
/// {
///   "chemical_name": { "dipirona": ["dipirona sódica"] },
///   "active_ingredient": { "dipirona": ["metamizol"] }
/// }
/// ```
///
/// Keys are matched case-insensitively. Terms missing from the file fall
/// through to the built-in tables when `fallback` is enabled.
#[derive(Debug, Clone, Default)]
pub struct FileSynonyms {
    chemical_name: HashMap<String, Vec<String>>,
    active_ingredient: HashMap<String, Vec<String>>,
    fallback: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SynonymFile {
    chemical_name: HashMap<String, Vec<String>>,
    active_ingredient: HashMap<String, Vec<String>>,
}

impl FileSynonyms {
    /// Parse synonym tables from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if the JSON does not match the expected shape.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: SynonymFile = serde_json::from_str(json)
            .map_err(|e| SearchError::Parse(format!("invalid synonym file: {e}")))?;
        let lower = |map: HashMap<String, Vec<String>>| {
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect::<HashMap<_, _>>()
        };
        Ok(Self {
            chemical_name: lower(file.chemical_name),
            active_ingredient: lower(file.active_ingredient),
            fallback: false,
        })
    }

    /// Load synonym tables from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Io`] if the file cannot be read, or
    /// [`SearchError::Parse`] if it is malformed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Consult the built-in tables for terms this file does not list.
    pub fn with_builtin_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

impl SynonymProvider for FileSynonyms {
    fn alternates(&self, table: SynonymTable, term: &str) -> Vec<String> {
        let map = match table {
            SynonymTable::ChemicalName => &self.chemical_name,
            SynonymTable::ActiveIngredient => &self.active_ingredient,
        };
        match map.get(&term.to_lowercase()) {
            Some(found) if !found.is_empty() => found.clone(),
            _ if self.fallback => BuiltinSynonyms.alternates(table, term),
            _ => Vec::new(),
        }
    }
}
