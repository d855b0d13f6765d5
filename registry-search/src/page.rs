//! Trait definition for the page-automation layer.
//!
//! The orchestrator never touches a browser or HTTP client directly. It
//! drives an implementation of [`PageDriver`], which renders the search
//! form, resolves selectors, submits, and exposes the results as a
//! [`Table`]. [`crate::driver::HtmlFormDriver`] is the bundled
//! implementation; tests use scripted mocks.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::Table;

/// A page-automation backend.
///
/// Every primitive takes a single selector; ranking across candidate
/// selectors is done once, in [`crate::locator`]. All methods must be
/// treated as fallible and potentially slow.
pub trait PageDriver: Send {
    /// Handle to a secondary page opened with [`PageDriver::open_scoped_page`].
    type Page: Send;

    /// Navigate to a clean search form, discarding any filled values.
    fn load_search_form(&mut self) -> impl Future<Output = Result<(), SearchError>> + Send;

    /// Whether `selector` matches a control on the current page.
    ///
    /// Must not act on the control or send any request; this is the step
    /// bounded by the locator timeout.
    fn resolve(&mut self, selector: &str) -> impl Future<Output = Result<bool, SearchError>> + Send;

    /// Fill the field matched by `selector` with `value`.
    ///
    /// Returns `Ok(false)` if nothing matches.
    fn fill(
        &mut self,
        selector: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, SearchError>> + Send;

    /// Click the control matched by `selector`: selects radios and
    /// checkboxes, submits forms through submit controls.
    ///
    /// A submitting click carries the whole navigation and is bounded by
    /// the driver's own request timeout only.
    ///
    /// Returns `Ok(false)` if nothing matches.
    fn click(&mut self, selector: &str) -> impl Future<Output = Result<bool, SearchError>> + Send;

    /// Submit the form owning the element matched by `selector`, as if
    /// Enter had been pressed in it.
    fn submit_via_keypress(
        &mut self,
        selector: &str,
    ) -> impl Future<Output = Result<(), SearchError>> + Send;

    /// Wait until the page has settled, for at most `timeout`.
    fn wait_until_settled(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), SearchError>> + Send;

    /// Locate the results table on the current page.
    ///
    /// Returns `Ok(None)` when the page reports no results or no matching
    /// table exists.
    fn extract_table(
        &mut self,
        policy: &TablePolicy,
    ) -> impl Future<Output = Result<Option<Table>, SearchError>> + Send;

    /// Open `url` as a secondary page, independent of the search form.
    fn open_scoped_page(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Page, SearchError>> + Send;

    /// Release a secondary page.
    fn close_scoped_page(&mut self, page: Self::Page) -> impl Future<Output = ()> + Send;

    /// Visible text of a secondary page, one line per text block.
    fn rendered_text(&self, page: &Self::Page) -> Result<String, SearchError>;

    /// Document title of a secondary page.
    fn page_title(&self, page: &Self::Page) -> Result<String, SearchError>;

    /// Persist a snapshot of the current page for post-mortem inspection.
    ///
    /// Returns where the snapshot went, if anywhere. The default does nothing.
    fn capture_diagnostics(
        &mut self,
        label: &str,
    ) -> impl Future<Output = Result<Option<String>, SearchError>> + Send {
        let _ = label;
        async { Ok(None) }
    }
}

impl<T: PageDriver> PageDriver for &mut T {
    type Page = T::Page;

    fn load_search_form(&mut self) -> impl Future<Output = Result<(), SearchError>> + Send {
        (**self).load_search_form()
    }

    fn resolve(&mut self, selector: &str) -> impl Future<Output = Result<bool, SearchError>> + Send {
        (**self).resolve(selector)
    }

    fn fill(
        &mut self,
        selector: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, SearchError>> + Send {
        (**self).fill(selector, value)
    }

    fn click(&mut self, selector: &str) -> impl Future<Output = Result<bool, SearchError>> + Send {
        (**self).click(selector)
    }

    fn submit_via_keypress(
        &mut self,
        selector: &str,
    ) -> impl Future<Output = Result<(), SearchError>> + Send {
        (**self).submit_via_keypress(selector)
    }

    fn wait_until_settled(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), SearchError>> + Send {
        (**self).wait_until_settled(timeout)
    }

    fn extract_table(
        &mut self,
        policy: &TablePolicy,
    ) -> impl Future<Output = Result<Option<Table>, SearchError>> + Send {
        (**self).extract_table(policy)
    }

    fn open_scoped_page(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Page, SearchError>> + Send {
        (**self).open_scoped_page(url, timeout)
    }

    fn close_scoped_page(&mut self, page: Self::Page) -> impl Future<Output = ()> + Send {
        (**self).close_scoped_page(page)
    }

    fn rendered_text(&self, page: &Self::Page) -> Result<String, SearchError> {
        (**self).rendered_text(page)
    }

    fn page_title(&self, page: &Self::Page) -> Result<String, SearchError> {
        (**self).page_title(page)
    }

    fn capture_diagnostics(
        &mut self,
        label: &str,
    ) -> impl Future<Output = Result<Option<String>, SearchError>> + Send {
        (**self).capture_diagnostics(label)
    }
}

/// Candidate selectors for every control on the search form, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLocators {
    pub product_term: Vec<String>,
    pub holder_id: Vec<String>,
    pub registration_date: Vec<String>,
    pub regularization_registered: Vec<String>,
    pub regularization_notified: Vec<String>,
    pub status_active: Vec<String>,
    pub status_inactive: Vec<String>,
    pub submit: Vec<String>,
    /// Element receiving the Enter key when no submit control resolves.
    pub keypress_target: String,
}

fn owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_string()).collect()
}

impl Default for FormLocators {
    fn default() -> Self {
        Self {
            product_term: owned(&[
                r#"input[placeholder*="Nome"]"#,
                r#"input[name*="nome"]"#,
                r#"input[id*="nome"]"#,
                r#"input[type="text"]:first-of-type"#,
            ]),
            holder_id: owned(&[r#"input[placeholder*="CNPJ"]"#, r#"input[name*="cnpj"]"#]),
            registration_date: owned(&[r#"input[type="date"]"#, r#"input[placeholder*="data"]"#]),
            regularization_registered: owned(&[r#"input[value*="REGISTRADO"]"#]),
            regularization_notified: owned(&[r#"input[value*="NOTIFICADO"]"#]),
            status_active: owned(&[r#"input[value*="Ativo"]"#]),
            status_inactive: owned(&[r#"input[value*="Inativo"]"#]),
            submit: owned(&[
                r#"button[type="submit"]"#,
                r#"input[type="submit"]"#,
                ".btn-primary",
                ".btn-search",
            ]),
            keypress_target: r#"input[type="text"]"#.to_string(),
        }
    }
}

/// How the results table is recognised and split into rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePolicy {
    /// The first table whose text contains any of these (case-insensitive).
    pub table_keywords: Vec<String>,
    /// Page text markers meaning "no results" (case-insensitive).
    pub no_results_markers: Vec<String>,
    /// Header row, tried inside the table; falls back to the first row.
    pub header_row_selector: String,
    /// Candidate data rows inside the table.
    pub row_selector: String,
    /// Rows with fewer data cells than this are not returned.
    pub min_data_cells: usize,
}

impl Default for TablePolicy {
    fn default() -> Self {
        Self {
            table_keywords: owned(&[
                "produto",
                "registro",
                "medicamento",
                "empresa",
                "situação",
                "validade",
            ]),
            no_results_markers: owned(&["nenhum resultado", "sem resultado", "não encontrado"]),
            header_row_selector: "thead tr".to_string(),
            row_selector: "tr".to_string(),
            min_data_cells: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locators_have_candidates() {
        let locators = FormLocators::default();
        assert_eq!(locators.product_term.len(), 4);
        assert!(locators.product_term[0].contains("Nome"));
        assert_eq!(locators.submit[0], r#"button[type="submit"]"#);
        assert!(!locators.keypress_target.is_empty());
    }

    #[test]
    fn default_selectors_are_valid_css() {
        let locators = FormLocators::default();
        let all = locators
            .product_term
            .iter()
            .chain(&locators.holder_id)
            .chain(&locators.registration_date)
            .chain(&locators.regularization_registered)
            .chain(&locators.regularization_notified)
            .chain(&locators.status_active)
            .chain(&locators.status_inactive)
            .chain(&locators.submit);
        for selector in all {
            assert!(
                scraper::Selector::parse(selector).is_ok(),
                "invalid selector: {selector}"
            );
        }
    }

    #[test]
    fn default_table_policy() {
        let policy = TablePolicy::default();
        assert_eq!(policy.min_data_cells, 2);
        assert!(policy.table_keywords.iter().any(|k| k == "registro"));
        assert!(policy.no_results_markers.iter().any(|k| k == "nenhum resultado"));
    }

    #[test]
    fn locators_partial_json_uses_defaults() {
        let locators: FormLocators =
            serde_json::from_str(r##"{"submit": ["#buscar"]}"##).expect("deserialize");
        assert_eq!(locators.submit, vec!["#buscar"]);
        assert_eq!(locators.product_term.len(), 4);
    }
}
