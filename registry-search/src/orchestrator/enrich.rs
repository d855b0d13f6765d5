//! Detail-page enrichment.
//!
//! Each eligible record's detail page is opened in its own scope, its
//! rendered text is matched against one pattern per field, and the page is
//! closed again whatever happened. Failures stay on the record.

use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::SearchError;
use crate::page::PageDriver;
use crate::types::{DetailOutcome, Record};

/// Value stored for a field whose pattern did not match.
pub const NOT_AVAILABLE: &str = "N/A";

/// Field holding the page title; always present on success.
pub const TITLE_FIELD: &str = "title";

const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("registry_number", r"(?i)(?:Registro|Nº)[^\d]*(\d\.\d{4}\.\d{8})"),
    ("company", r"(?i)(?:Empresa|Detentor)[^:]*:([^\n]+)"),
    ("active_ingredient", r"(?i)(?:Princípio Ativo|Ativo)[^:]*:([^\n]+)"),
    ("concentration", r"(?i)(\d+\s*(?:mg|g)/?\s*(?:mL|L|g|kg))"),
    ("presentation", r"(?i)(?:Apresentação|Forma)[^:]*:([^\n]+)"),
    ("category", r"(?i)(?:Categoria|Tipo)[^:]*:([^\n]+)"),
    ("status", r"(?i)(?:Situação|Status)[^:]*:([^\n]+)"),
    ("registration_date", r"(?i)(?:Data.*Registro|Registro.*Data)[^:]*:([^\n]+)"),
    ("expiry_date", r"(?i)(?:Data.*Vencimento|Vence)[^:]*:([^\n]+)"),
];

/// Named field patterns applied to a detail page's text.
///
/// Each pattern's first capture group is the field value.
#[derive(Debug, Clone)]
pub struct DetailRules {
    rules: Vec<(String, Regex)>,
}

impl DetailRules {
    /// The registry's built-in field set.
    pub fn builtin() -> Result<Self, SearchError> {
        Self::from_patterns(BUILTIN_PATTERNS.iter().copied())
    }

    /// Compile `(field, pattern)` pairs, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if a pattern does not compile or has
    /// no capture group.
    pub fn from_patterns<I, K, P>(patterns: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        let mut rules = Vec::new();
        for (field, pattern) in patterns {
            let field = field.into();
            let regex = Regex::new(pattern.as_ref())
                .map_err(|e| SearchError::Config(format!("detail pattern for {field}: {e}")))?;
            if regex.captures_len() < 2 {
                return Err(SearchError::Config(format!(
                    "detail pattern for {field} has no capture group"
                )));
            }
            rules.push((field, regex));
        }
        Ok(Self { rules })
    }

    /// Field names in output order, title first.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(TITLE_FIELD).chain(self.rules.iter().map(|(f, _)| f.as_str()))
    }

    /// Apply every rule to `text`. Every field is present in the result.
    pub fn extract(&self, title: &str, text: &str) -> IndexMap<String, String> {
        let mut fields = IndexMap::with_capacity(self.rules.len() + 1);
        let title = title.trim();
        fields.insert(
            TITLE_FIELD.to_string(),
            if title.is_empty() { NOT_AVAILABLE } else { title }.to_string(),
        );
        for (field, regex) in &self.rules {
            let value = regex
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(NOT_AVAILABLE);
            fields.insert(field.clone(), value.to_string());
        }
        fields
    }
}

/// Tallies from one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Visits detail pages, one at a time.
#[derive(Debug, Clone)]
pub struct DetailEnricher {
    rules: DetailRules,
    timeout: Duration,
    pause: Duration,
}

impl DetailEnricher {
    pub fn new(rules: DetailRules, timeout: Duration, pause: Duration) -> Self {
        Self {
            rules,
            timeout,
            pause,
        }
    }

    /// Enrich every record holding a fetchable detail link, in order,
    /// pausing between successive fetches.
    pub async fn enrich_all<P: PageDriver>(
        &self,
        driver: &mut P,
        records: &mut [Record],
    ) -> EnrichSummary {
        let eligible: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.fetchable_detail_url().is_some())
            .map(|(i, _)| i)
            .collect();
        tracing::info!(
            eligible = eligible.len(),
            total = records.len(),
            "enriching records from detail pages"
        );

        let mut summary = EnrichSummary::default();
        for (position, &index) in eligible.iter().enumerate() {
            if position > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            summary.attempted += 1;
            if self.enrich(driver, &mut records[index]).await {
                summary.succeeded += 1;
            }
        }
        summary
    }

    /// Enrich one record. Returns whether the detail page was read.
    ///
    /// Records without a fetchable link are left untouched.
    pub async fn enrich<P: PageDriver>(&self, driver: &mut P, record: &mut Record) -> bool {
        let Some(url) = record.fetchable_detail_url().map(str::to_string) else {
            return false;
        };
        tracing::debug!(url = %url, "fetching detail page");

        let outcome = match self.read_page(driver, &url).await {
            Ok(fields) => DetailOutcome::success(fields),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "detail page failed");
                DetailOutcome::failure(err.to_string())
            }
        };
        let extracted = outcome.extracted;
        record.details = Some(outcome);
        extracted
    }

    async fn read_page<P: PageDriver>(
        &self,
        driver: &mut P,
        url: &str,
    ) -> Result<IndexMap<String, String>, SearchError> {
        let page = driver.open_scoped_page(url, self.timeout).await?;
        let read = driver
            .page_title(&page)
            .and_then(|title| Ok((title, driver.rendered_text(&page)?)));
        driver.close_scoped_page(page).await;
        let (title, text) = read?;
        Ok(self.rules.extract(&title, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_TEXT: &str = "DIPIRONA SÓDICA\n\
        Nº do Registro: 1.0235.00120011\n\
        Empresa: EMS S/A\n\
        Princípio Ativo: dipirona monoidratada\n\
        Apresentação: 500 mg/mL solução oral, frasco com 20 mL\n\
        Categoria: Genérico\n\
        Situação: Válido\n\
        Data de Registro: 12/03/2001\n\
        Data de Vencimento: 03/2026";

    fn rules() -> DetailRules {
        DetailRules::builtin().expect("builtin patterns compile")
    }

    #[test]
    fn builtin_fields_in_order() {
        let fields: Vec<_> = rules().fields().map(str::to_string).collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], "title");
        assert_eq!(fields[1], "registry_number");
        assert_eq!(fields[9], "expiry_date");
    }

    #[test]
    fn extracts_every_builtin_field() {
        let fields = rules().extract("Detalhe", DETAIL_TEXT);
        assert_eq!(fields["title"], "Detalhe");
        assert_eq!(fields["registry_number"], "1.0235.00120011");
        assert_eq!(fields["company"], "EMS S/A");
        assert_eq!(fields["active_ingredient"], "dipirona monoidratada");
        assert_eq!(fields["concentration"], "500 mg/mL");
        assert_eq!(
            fields["presentation"],
            "500 mg/mL solução oral, frasco com 20 mL"
        );
        assert_eq!(fields["category"], "Genérico");
        assert_eq!(fields["status"], "Válido");
        assert_eq!(fields["registration_date"], "12/03/2001");
        assert_eq!(fields["expiry_date"], "03/2026");
    }

    #[test]
    fn value_stops_at_line_end() {
        let fields = rules().extract("t", "Empresa: EMS S/A\nOutra linha: nada");
        assert_eq!(fields["company"], "EMS S/A");
    }

    #[test]
    fn misses_use_sentinel_and_all_fields_present() {
        let rules = rules();
        let fields = rules.extract("", "página sem dados");
        assert_eq!(fields.len(), rules.fields().count());
        assert!(fields.values().all(|v| v == NOT_AVAILABLE));
    }

    #[test]
    fn custom_patterns_validated() {
        assert!(DetailRules::from_patterns([("x", "(unclosed")]).is_err());
        assert!(DetailRules::from_patterns([("x", "no group")]).is_err());
        let rules = DetailRules::from_patterns([("lote", r"Lote:\s*(\w+)")]).expect("valid");
        assert_eq!(rules.extract("t", "Lote: A12")["lote"], "A12");
    }
}
