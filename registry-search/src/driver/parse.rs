//! Synchronous HTML helpers for [`super::HtmlFormDriver`].
//!
//! `scraper::Html` is not `Send`, so documents are parsed and dropped
//! inside these functions; only owned data crosses an `.await`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::SearchError;
use crate::extract::{collapse_whitespace, positional_label};
use crate::page::TablePolicy;
use crate::types::{Cell, Link, Table, TableRow};

pub(crate) fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("invalid selector {css:?}: {e:?}")))
}

/// Control matched by a selector, reduced to what the driver acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    /// Text-like input, select or textarea carrying a form value.
    Field { name: String },
    /// Radio button or checkbox.
    Toggle { name: String, value: String },
    /// Submit button; its own name/value pair is sent when present.
    Submit {
        form_index: usize,
        pair: Option<(String, String)>,
    },
    /// Plain hyperlink.
    Link { href: String },
}

/// What a submitted form asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FormRequest {
    pub method: reqwest::Method,
    pub action: Url,
    pub pairs: Vec<(String, String)>,
}

/// Resolve `css` against `html` and classify the first match.
///
/// Returns `Ok(None)` when nothing matches or the match cannot be acted on.
/// Only `input[type=submit|image]` and submit buttons submit a form; labels,
/// spans and other containers are never clickable.
pub(crate) fn find_control(html: &str, css: &str) -> Result<Option<Control>, SearchError> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);
    let Some(element) = document.select(&sel).next() else {
        return Ok(None);
    };
    let el = element.value();
    let name = el.attr("name").map(str::to_string);

    let control = match el.name() {
        "input" => {
            let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "radio" | "checkbox" => name.map(|name| Control::Toggle {
                    name,
                    value: el.attr("value").unwrap_or("on").to_string(),
                }),
                "submit" | "image" => form_index(&document, element).map(|form_index| {
                    Control::Submit {
                        form_index,
                        pair: name.map(|n| (n, el.attr("value").unwrap_or_default().to_string())),
                    }
                }),
                "button" | "reset" | "file" => None,
                _ => name.map(|name| Control::Field { name }),
            }
        }
        "select" | "textarea" => name.map(|name| Control::Field { name }),
        "button" => {
            let kind = el.attr("type").unwrap_or("submit").to_ascii_lowercase();
            if kind == "submit" {
                form_index(&document, element).map(|form_index| Control::Submit {
                    form_index,
                    pair: name.map(|n| (n, el.attr("value").unwrap_or_default().to_string())),
                })
            } else {
                None
            }
        }
        "a" => el.attr("href").map(|href| Control::Link {
            href: href.to_string(),
        }),
        _ => None,
    };
    Ok(control)
}

/// Index, among all forms in the document, of the form owning `element`.
fn form_index(document: &Html, element: ElementRef<'_>) -> Option<usize> {
    let form = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form")?;
    let form_sel = Selector::parse("form").ok()?;
    document.select(&form_sel).position(|f| f.id() == form.id())
}

/// Index of the form owning the first element matched by `css`.
pub(crate) fn owning_form(html: &str, css: &str) -> Result<Option<usize>, SearchError> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&sel)
        .next()
        .and_then(|element| form_index(&document, element)))
}

/// Serialise form number `form_index` the way a browser would on submit,
/// with `overrides` replacing any same-named values.
pub(crate) fn build_form_request(
    html: &str,
    base: &Url,
    form_index: usize,
    overrides: &[(String, String)],
    submitter: Option<&(String, String)>,
) -> Result<FormRequest, SearchError> {
    let document = Html::parse_document(html);
    let form_sel = selector("form")?;
    let form = document
        .select(&form_sel)
        .nth(form_index)
        .ok_or_else(|| SearchError::Navigation(format!("form #{form_index} not found")))?;

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => reqwest::Method::POST,
        _ => reqwest::Method::GET,
    };
    let action = match form.value().attr("action").map(str::trim) {
        Some(a) if !a.is_empty() => base
            .join(a)
            .map_err(|e| SearchError::Navigation(format!("bad form action {a:?}: {e}")))?,
        _ => base.clone(),
    };

    let mut pairs = current_values(form)?;
    for (name, value) in overrides {
        pairs.retain(|(n, _)| n != name);
        pairs.push((name.clone(), value.clone()));
    }
    if let Some(pair) = submitter {
        pairs.push(pair.clone());
    }

    Ok(FormRequest {
        method,
        action,
        pairs,
    })
}

fn current_values(form: ElementRef<'_>) -> Result<Vec<(String, String)>, SearchError> {
    let controls = selector("input, select, textarea")?;
    let option_sel = selector("option")?;
    let mut pairs = Vec::new();

    for control in form.select(&controls) {
        let el = control.value();
        if el.attr("disabled").is_some() {
            continue;
        }
        let Some(name) = el.attr("name") else {
            continue;
        };
        let value = match el.name() {
            "input" => {
                let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "image" | "button" | "reset" | "file" => continue,
                    "radio" | "checkbox" if el.attr("checked").is_none() => continue,
                    "radio" | "checkbox" => el.attr("value").unwrap_or("on").to_string(),
                    _ => el.attr("value").unwrap_or_default().to_string(),
                }
            }
            "select" => {
                let options: Vec<_> = control.select(&option_sel).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                match chosen {
                    Some(option) => option
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| option.text().collect::<String>().trim().to_string()),
                    None => continue,
                }
            }
            _ => control.text().collect(),
        };
        pairs.push((name.to_string(), value));
    }
    Ok(pairs)
}

/// Locate and split the results table.
///
/// `Ok(None)` when the page carries a no-results marker or no table
/// mentions any of the policy keywords.
pub(crate) fn parse_results_table(
    html: &str,
    base: &Url,
    policy: &TablePolicy,
) -> Result<Option<Table>, SearchError> {
    let document = Html::parse_document(html);

    let page_text = document.root_element().text().collect::<String>().to_lowercase();
    if let Some(marker) = policy
        .no_results_markers
        .iter()
        .find(|m| page_text.contains(&m.to_lowercase()))
    {
        tracing::debug!(marker = %marker, "page reports no results");
        return Ok(None);
    }

    let table_sel = selector("table")?;
    let Some(table) = document.select(&table_sel).find(|t| {
        let text = t.text().collect::<String>().to_lowercase();
        policy
            .table_keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()))
    }) else {
        tracing::debug!("no results table on page");
        return Ok(None);
    };

    let header_sel = selector(&policy.header_row_selector)?;
    let row_sel = selector(&policy.row_selector)?;
    let first_row_sel = selector("tr")?;
    let header_cell_sel = selector("th, td")?;
    let data_cell_sel = selector("td")?;
    let anchor_sel = selector("a[href]")?;

    let header_row = table
        .select(&header_sel)
        .next()
        .or_else(|| table.select(&first_row_sel).next());
    // Headers keep their column position; blank ones get a positional label.
    let headers = header_row
        .map(|row| {
            row.select(&header_cell_sel)
                .enumerate()
                .map(|(index, cell)| match element_text(cell) {
                    text if text.is_empty() => positional_label(index),
                    text => text,
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = table
        .select(&row_sel)
        .filter(|row| row.select(&data_cell_sel).count() >= policy.min_data_cells)
        .map(|row| {
            TableRow::new(
                row.select(&header_cell_sel)
                    .map(|cell| build_cell(cell, &anchor_sel, base))
                    .collect(),
            )
        })
        .collect();

    Ok(Some(Table { headers, rows }))
}

/// Text of an element with its text nodes space-separated, so `<br>` and
/// nested elements never glue words together.
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn build_cell(cell: ElementRef<'_>, anchor_sel: &Selector, base: &Url) -> Cell {
    let links = cell
        .select(anchor_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string());
            Some(Link {
                url,
                text: collapse_whitespace(&a.text().collect::<String>()),
            })
        })
        .collect();
    Cell {
        text: element_text(cell),
        links,
    }
}

/// Elements that start and end a line of rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tr",
    "ul",
];

/// Elements whose content is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Accumulates rendered lines, squeezing whitespace within each.
#[derive(Default)]
struct TextLines {
    lines: Vec<String>,
    current: String,
}

impl TextLines {
    fn break_line(&mut self) {
        let line = collapse_whitespace(&self.current);
        if !line.is_empty() {
            self.lines.push(line);
        }
        self.current.clear();
    }

    fn render(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.current.push_str(text);
                continue;
            }
            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            match child.value().name() {
                name if HIDDEN_ELEMENTS.contains(&name) => {}
                "br" => self.break_line(),
                // Cells of one row stay on one line, so "label | value"
                // layouts read like inline pairs.
                "td" | "th" => {
                    self.current.push(' ');
                    self.render(child);
                    self.current.push(' ');
                }
                name if BLOCK_ELEMENTS.contains(&name) => {
                    self.break_line();
                    self.render(child);
                    self.break_line();
                }
                _ => self.render(child),
            }
        }
    }
}

/// Visible text of the body, one line per block element or `<br>`.
///
/// Inline markup is joined into its surrounding line, so
/// `<p><b>Empresa:</b> EMS</p>` renders as `Empresa: EMS`.
pub(crate) fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut out = TextLines::default();
    out.render(body);
    out.break_line();
    out.lines.join("\n")
}

/// Contents of `<title>`, whitespace-collapsed; empty if absent.
pub(crate) fn document_title(html: &str) -> String {
    let document = Html::parse_document(html);
    Selector::parse("title")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = include_str!("../../test-data/registry_results.html");
    const FORM_HTML: &str = include_str!("../../test-data/registry_form.html");
    const DETAIL_HTML: &str = include_str!("../../test-data/registry_detail.html");
    const INLINE_DETAIL_HTML: &str =
        include_str!("../../test-data/registry_detail_inline.html");

    fn base() -> Url {
        Url::parse("https://registry.example/consulta/").expect("url")
    }

    #[test]
    fn fixture_results_table_is_split() {
        let table = parse_results_table(RESULTS_HTML, &base(), &TablePolicy::default())
            .expect("parse")
            .expect("table present");
        assert_eq!(
            table.headers,
            vec!["Produto", "Empresa", "Registro", "Situação"]
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].cells[0].text, "DIPIRONA SÓDICA");
        assert_eq!(table.rows[0].cells.len(), 4);
    }

    #[test]
    fn fixture_links_are_absolute() {
        let table = parse_results_table(RESULTS_HTML, &base(), &TablePolicy::default())
            .expect("parse")
            .expect("table present");
        let link = table.rows[0].first_link().expect("link");
        assert_eq!(link.url, "https://registry.example/consulta/produto/1023500120011");
        assert_eq!(link.text, "DIPIRONA SÓDICA");
    }

    #[test]
    fn layout_table_without_keywords_is_skipped() {
        let html = r#"<html><body>
            <table><tr><td>menu</td><td>home</td></tr></table>
            <table><tr><th>Produto</th><th>Empresa</th></tr>
                   <tr><td>A</td><td>B</td></tr></table>
        </body></html>"#;
        let table = parse_results_table(html, &base(), &TablePolicy::default())
            .expect("parse")
            .expect("table");
        assert_eq!(table.headers, vec!["Produto", "Empresa"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn cell_text_spans_line_breaks() {
        let html = r#"<html><body><table>
            <tr><th>Produto</th><th>Empresa</th></tr>
            <tr><td>DIPIRONA<br>SÓDICA</td><td><b>EMS</b>S/A<br/>Genérico</td></tr>
        </table></body></html>"#;
        let table = parse_results_table(html, &base(), &TablePolicy::default())
            .expect("parse")
            .expect("table");
        assert_eq!(table.rows[0].cells[0].text, "DIPIRONA SÓDICA");
        assert_eq!(table.rows[0].cells[1].text, "EMS S/A Genérico");
    }

    #[test]
    fn blank_header_cells_keep_their_position() {
        let html = r#"<html><body><table>
            <tr><th></th><th>Produto</th><th> </th><th>Empresa</th></tr>
            <tr><td>1</td><td>DIPIRONA</td><td>x</td><td>EMS</td></tr>
        </table></body></html>"#;
        let table = parse_results_table(html, &base(), &TablePolicy::default())
            .expect("parse")
            .expect("table");
        assert_eq!(
            table.headers,
            vec!["column_1", "Produto", "column_3", "Empresa"]
        );
        assert_eq!(table.rows[0].cells.len(), table.headers.len());
    }

    #[test]
    fn no_results_marker_yields_none() {
        let html = "<html><body><p>Nenhum resultado encontrado</p>\
                    <table><tr><th>Produto</th></tr></table></body></html>";
        let table = parse_results_table(html, &base(), &TablePolicy::default()).expect("parse");
        assert!(table.is_none());
    }

    #[test]
    fn no_keyword_table_yields_none() {
        let html = "<html><body><table><tr><td>a</td><td>b</td></tr></table></body></html>";
        let table = parse_results_table(html, &base(), &TablePolicy::default()).expect("parse");
        assert!(table.is_none());
    }

    #[test]
    fn invalid_policy_selector_is_parse_error() {
        let policy = TablePolicy {
            row_selector: "tr[".into(),
            ..Default::default()
        };
        let err = parse_results_table(RESULTS_HTML, &base(), &policy).expect_err("bad selector");
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[test]
    fn classifies_form_controls() {
        assert_eq!(
            find_control(FORM_HTML, r#"input[placeholder*="Nome"]"#).expect("parse"),
            Some(Control::Field {
                name: "nomeProduto".into()
            })
        );
        assert_eq!(
            find_control(FORM_HTML, r#"input[value*="NOTIFICADO"]"#).expect("parse"),
            Some(Control::Toggle {
                name: "tipoRegularizacao".into(),
                value: "NOTIFICADO".into(),
            })
        );
        assert_eq!(
            find_control(FORM_HTML, r#"button[type="submit"]"#).expect("parse"),
            Some(Control::Submit {
                form_index: 1,
                pair: Some(("acao".into(), "buscar".into())),
            })
        );
        assert_eq!(find_control(FORM_HTML, "#missing").expect("parse"), None);
    }

    #[test]
    fn containers_inside_a_form_are_not_submit_controls() {
        assert_eq!(find_control(FORM_HTML, "#consulta label").expect("parse"), None);

        let html = r#"<html><body><form action="resultados">
            <span class="buscar">Pesquisar</span>
            <div id="acoes"><input type="text" name="q"></div>
        </form></body></html>"#;
        assert_eq!(find_control(html, "span.buscar").expect("parse"), None);
        assert_eq!(find_control(html, "#acoes").expect("parse"), None);
        assert_eq!(
            find_control(html, "#acoes input").expect("parse"),
            Some(Control::Field { name: "q".into() })
        );
    }

    #[test]
    fn form_request_applies_overrides() {
        let overrides = vec![
            ("nomeProduto".to_string(), "dipirona".to_string()),
            ("tipoRegularizacao".to_string(), "NOTIFICADO".to_string()),
        ];
        let submitter = ("acao".to_string(), "buscar".to_string());
        let request =
            build_form_request(FORM_HTML, &base(), 1, &overrides, Some(&submitter)).expect("form");
        assert_eq!(request.method, reqwest::Method::GET);
        assert_eq!(request.action.as_str(), "https://registry.example/consulta/resultados");
        let get = |name: &str| {
            request
                .pairs
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(get("nomeProduto"), vec!["dipirona"]);
        assert_eq!(get("tipoRegularizacao"), vec!["NOTIFICADO"]);
        assert_eq!(get("situacao"), vec!["Ativo"]);
        assert_eq!(get("categoria"), vec!["todos"]);
        assert_eq!(get("origem"), vec!["web"]);
        assert_eq!(get("acao"), vec!["buscar"]);
    }

    #[test]
    fn owning_form_of_text_input() {
        assert_eq!(
            owning_form(FORM_HTML, r#"input[type="text"]"#).expect("parse"),
            Some(1)
        );
        assert_eq!(owning_form(FORM_HTML, "#missing").expect("parse"), None);
    }

    #[test]
    fn visible_text_skips_scripts() {
        let text = visible_text(DETAIL_HTML);
        assert!(text.contains("Empresa: EMS S/A"));
        assert!(!text.contains("trackView"));
        assert!(text.lines().all(|l| !l.trim().is_empty()));
    }

    #[test]
    fn inline_labels_stay_on_their_value_line() {
        let text = visible_text(INLINE_DETAIL_HTML);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"Empresa: EMS S/A"));
        assert!(lines.contains(&"Princípio Ativo: dipirona monoidratada"));
        assert!(lines.contains(&"Situação: Válido"));
        assert!(lines.contains(&"Categoria: Genérico"));
        assert!(lines.contains(&"DIPIRONA SÓDICA"));
        assert!(!text.contains("Cancelado"));
    }

    #[test]
    fn line_break_splits_a_paragraph() {
        let text = visible_text(INLINE_DETAIL_HTML);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"Apresentação: 500 mg/mL solução oral"));
        assert!(lines.contains(&"frasco com 20 mL"));
    }

    #[test]
    fn inline_detail_fields_are_extracted() {
        let rules = crate::orchestrator::DetailRules::builtin().expect("rules");
        let fields = rules.extract(
            &document_title(INLINE_DETAIL_HTML),
            &visible_text(INLINE_DETAIL_HTML),
        );
        assert_eq!(fields["company"], "EMS S/A");
        assert_eq!(fields["status"], "Válido");
    }

    #[test]
    fn title_is_read() {
        assert_eq!(document_title(DETAIL_HTML), "DIPIRONA SÓDICA - Detalhe do Produto");
        assert_eq!(document_title("<html><body></body></html>"), "");
    }
}
