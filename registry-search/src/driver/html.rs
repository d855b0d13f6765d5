//! HTTP-backed [`PageDriver`].

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::parse::{self, Control};
use crate::config::DriverConfig;
use crate::error::SearchError;
use crate::http;
use crate::page::{PageDriver, TablePolicy};
use crate::types::Table;

#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    html: String,
}

/// A detail page opened with [`PageDriver::open_scoped_page`].
#[derive(Debug, Clone)]
pub struct DetailPage {
    url: Url,
    html: String,
}

impl DetailPage {
    /// Final URL after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Drives the registry form with plain HTTP requests.
///
/// Filled values are held client-side until the form is submitted, then
/// sent together with the form's own defaults.
pub struct HtmlFormDriver {
    client: reqwest::Client,
    config: DriverConfig,
    search_url: Url,
    current: Option<LoadedPage>,
    pending: Vec<(String, String)>,
}

impl HtmlFormDriver {
    /// Create a driver for `config.search_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid configuration and
    /// [`SearchError::Http`] if the client cannot be built.
    pub fn new(config: DriverConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(&config)?;
        let search_url = Url::parse(&config.search_url)
            .map_err(|e| SearchError::Config(format!("search_url is not a valid URL: {e}")))?;
        Ok(Self {
            client,
            config,
            search_url,
            current: None,
            pending: Vec::new(),
        })
    }

    /// URL of the page currently loaded, if any.
    pub fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|p| &p.url)
    }

    fn page(&self) -> Result<&LoadedPage, SearchError> {
        self.current
            .as_ref()
            .ok_or_else(|| SearchError::Navigation("no page loaded".into()))
    }

    fn set_pending(&mut self, name: String, value: String) {
        self.pending.retain(|(n, _)| *n != name);
        self.pending.push((name, value));
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<LoadedPage, SearchError> {
        let response = request
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("registry returned an error status: {e}")))?;
        let url = response.url().clone();
        let html = response.text().await.map_err(request_error)?;
        tracing::trace!(url = %url, bytes = html.len(), "page fetched");
        Ok(LoadedPage { url, html })
    }

    async fn navigate(&mut self, url: Url) -> Result<(), SearchError> {
        let page = self.fetch(self.client.get(url)).await?;
        self.current = Some(page);
        self.pending.clear();
        Ok(())
    }

    async fn submit_form(
        &mut self,
        form_index: usize,
        submitter: Option<(String, String)>,
    ) -> Result<(), SearchError> {
        let page = self.page()?;
        let request = parse::build_form_request(
            &page.html,
            &page.url,
            form_index,
            &self.pending,
            submitter.as_ref(),
        )?;
        tracing::debug!(
            method = %request.method,
            action = %request.action,
            fields = request.pairs.len(),
            "submitting form"
        );

        let builder = if request.method == reqwest::Method::POST {
            self.client.post(request.action).form(&request.pairs)
        } else {
            let mut url = request.action;
            url.set_fragment(None);
            url.query_pairs_mut().clear().extend_pairs(&request.pairs);
            self.client.get(url)
        };

        let loaded = self.fetch(builder).await?;
        self.current = Some(loaded);
        self.pending.clear();
        Ok(())
    }
}

fn request_error(err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout(err.to_string())
    } else {
        SearchError::Navigation(err.to_string())
    }
}

/// Keep labels usable as file names.
fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl PageDriver for HtmlFormDriver {
    type Page = DetailPage;

    async fn load_search_form(&mut self) -> Result<(), SearchError> {
        let url = self.search_url.clone();
        tracing::debug!(url = %url, "loading search form");
        self.navigate(url).await
    }

    async fn resolve(&mut self, selector: &str) -> Result<bool, SearchError> {
        let page = self.page()?;
        Ok(parse::find_control(&page.html, selector)?.is_some())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<bool, SearchError> {
        let page = self.page()?;
        match parse::find_control(&page.html, selector)? {
            Some(Control::Field { name }) => {
                self.set_pending(name, value.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn click(&mut self, selector: &str) -> Result<bool, SearchError> {
        let page = self.page()?;
        let base = page.url.clone();
        match parse::find_control(&page.html, selector)? {
            Some(Control::Toggle { name, value }) => {
                self.set_pending(name, value);
                Ok(true)
            }
            Some(Control::Submit { form_index, pair }) => {
                self.submit_form(form_index, pair).await?;
                Ok(true)
            }
            Some(Control::Link { href }) => {
                let target = base
                    .join(&href)
                    .map_err(|e| SearchError::Navigation(format!("bad link {href:?}: {e}")))?;
                self.navigate(target).await?;
                Ok(true)
            }
            Some(Control::Field { .. }) | None => Ok(false),
        }
    }

    async fn submit_via_keypress(&mut self, selector: &str) -> Result<(), SearchError> {
        let page = self.page()?;
        let form_index = parse::owning_form(&page.html, selector)?
            .ok_or_else(|| SearchError::LocatorNotFound(format!("no form owns {selector}")))?;
        self.submit_form(form_index, None).await
    }

    async fn wait_until_settled(&mut self, timeout: Duration) -> Result<(), SearchError> {
        // Responses are complete once fetched; the delay only paces requests.
        let delay = Duration::from_millis(self.config.settle_delay_ms).min(timeout);
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn extract_table(&mut self, policy: &TablePolicy) -> Result<Option<Table>, SearchError> {
        let page = self.page()?;
        parse::parse_results_table(&page.html, &page.url, policy)
    }

    async fn open_scoped_page(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<DetailPage, SearchError> {
        let target = Url::parse(url)
            .map_err(|e| SearchError::Navigation(format!("bad detail URL {url:?}: {e}")))?;
        let loaded = tokio::time::timeout(timeout, self.fetch(self.client.get(target)))
            .await
            .map_err(|_| {
                SearchError::Timeout(format!("detail page {url} after {}ms", timeout.as_millis()))
            })??;
        Ok(DetailPage {
            url: loaded.url,
            html: loaded.html,
        })
    }

    async fn close_scoped_page(&mut self, page: DetailPage) {
        tracing::trace!(url = %page.url, "detail page closed");
    }

    fn rendered_text(&self, page: &DetailPage) -> Result<String, SearchError> {
        Ok(parse::visible_text(&page.html))
    }

    fn page_title(&self, page: &DetailPage) -> Result<String, SearchError> {
        Ok(parse::document_title(&page.html))
    }

    async fn capture_diagnostics(&mut self, label: &str) -> Result<Option<String>, SearchError> {
        let (Some(dir), Some(page)) = (self.config.diagnostics_dir.as_ref(), self.current.as_ref())
        else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let path: PathBuf = dir.join(format!("{}_{stamp}.html", file_stem(label)));
        tokio::fs::write(&path, page.html.as_bytes()).await?;
        tracing::info!(path = %path.display(), "diagnostic snapshot written");
        Ok(Some(path.display().to_string()))
    }
}
