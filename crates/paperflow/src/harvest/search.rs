//! Direct web search for PDF links on arXiv, Google Scholar and Google.
//!
//! Each source is a plain HTML results page. The parsers are pure functions over the page text
//! so they can be exercised without a network; [`SearchClient`] only builds the query URLs,
//! fetches the pages and merges what the parsers return.

use std::collections::HashSet;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use scraper::{Html, Selector};

use super::*;
use crate::{
  config::SearchSource,
  fetch::{http_client, is_pdf_url, USER_AGENT},
};

/// Accept header for result pages.
const ACCEPT_HTML: &str = "text/html,*/*";

/// Results pages are requested in English so the markup stays predictable.
const LANGUAGE: &str = "en-US,en;q=0.9";

/// Hrefs of every anchor in `html`.
fn hrefs(html: &str, selector: &str) -> Vec<String> {
  let Ok(selector) = Selector::parse(selector) else {
    return Vec::new();
  };
  Html::parse_document(html)
    .select(&selector)
    .filter_map(|a| a.value().attr("href").map(str::to_string))
    .collect()
}

/// PDF links of an arXiv search results page, resolved against `base`.
pub fn parse_arxiv(base: &Url, html: &str) -> Vec<String> {
  hrefs(html, "a[href]")
    .iter()
    .filter_map(|href| base.join(href).ok())
    .filter(|url| url.host_str() == base.host_str() && url.path().starts_with("/pdf/"))
    .map(String::from)
    .collect()
}

/// PDF links of a Google Scholar results page.
///
/// The side links next to each result (`div.gs_or_ggsm`) are preferred; when there are none,
/// every PDF-looking anchor of the page is taken.
pub fn parse_scholar(base: &Url, html: &str) -> Vec<String> {
  let pdf_links = |selector: &str| -> Vec<String> {
    hrefs(html, selector)
      .iter()
      .filter(|href| is_pdf_url(href))
      .filter_map(|href| base.join(href).ok().map(String::from))
      .collect()
  };

  let side_links = pdf_links("div.gs_or_ggsm a[href]");
  if side_links.is_empty() {
    pdf_links("a[href]")
  } else {
    side_links
  }
}

/// PDF links of a Google results page, with `/url?q=` redirects unwrapped.
pub fn parse_google(html: &str) -> Vec<String> {
  hrefs(html, "a[href]")
    .iter()
    .map(|href| if href.starts_with("/url?") { decode_redirect(href) } else { href.clone() })
    .filter(|href| href.starts_with("http") && is_pdf_url(href))
    .collect()
}

/// Base URLs of the search engines. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct SearchEndpoints {
  /// arXiv, `https://arxiv.org`
  pub arxiv:   String,
  /// Google Scholar, `https://scholar.google.com`
  pub scholar: String,
  /// Google, `https://www.google.com`
  pub google:  String,
}

impl Default for SearchEndpoints {
  fn default() -> Self {
    Self {
      arxiv:   "https://arxiv.org".to_string(),
      scholar: "https://scholar.google.com".to_string(),
      google:  "https://www.google.com".to_string(),
    }
  }
}

/// Queries the configured sources and collects PDF links.
#[derive(Debug, Clone)]
pub struct SearchClient {
  /// HTTP client with browser user agent
  client:    reqwest::Client,
  /// Engine base URLs
  endpoints: SearchEndpoints,
}

impl SearchClient {
  /// A client with the given request timeout.
  pub fn new(timeout: Duration) -> Result<Self> {
    Ok(Self { client: http_client(USER_AGENT, timeout)?, endpoints: SearchEndpoints::default() })
  }

  /// Replaces the engine base URLs.
  pub fn with_endpoints(mut self, endpoints: SearchEndpoints) -> Self {
    self.endpoints = endpoints;
    self
  }

  /// The results page URL for one source.
  pub fn query_url(&self, source: SearchSource, query: &str, max_results: usize) -> Result<Url> {
    let url = match source {
      SearchSource::Arxiv => Url::parse_with_params(
        &format!("{}/search/", self.endpoints.arxiv.trim_end_matches('/')),
        &[
          ("query", query.to_string()),
          ("searchtype", "all".to_string()),
          ("abstracts", "show".to_string()),
          ("order", "-announced_date_first".to_string()),
          ("size", max_results.to_string()),
        ],
      )?,
      SearchSource::Scholar => Url::parse_with_params(
        &format!("{}/scholar", self.endpoints.scholar.trim_end_matches('/')),
        &[("q", query.to_string())],
      )?,
      SearchSource::Google => Url::parse_with_params(
        &format!("{}/search", self.endpoints.google.trim_end_matches('/')),
        &[("q", format!("{query} filetype:pdf")), ("num", max_results.to_string())],
      )?,
    };
    Ok(url)
  }

  /// Searches one source, returning at most `max_results` links.
  pub async fn search_source(
    &self,
    source: SearchSource,
    query: &str,
    max_results: usize,
  ) -> Result<Vec<String>> {
    let url = self.query_url(source, query, max_results)?;
    debug!(%source, %url, "searching");
    let response = self
      .client
      .get(url)
      .header(ACCEPT, ACCEPT_HTML)
      .header(ACCEPT_LANGUAGE, LANGUAGE)
      .send()
      .await?
      .error_for_status()?;
    let page_url = response.url().clone();
    let html = response.text().await?;

    let mut links = match source {
      SearchSource::Arxiv => parse_arxiv(&page_url, &html),
      SearchSource::Scholar => parse_scholar(&page_url, &html),
      SearchSource::Google => parse_google(&html),
    };
    let mut seen = HashSet::new();
    links.retain(|link| seen.insert(link.clone()));
    links.truncate(max_results);
    Ok(links)
  }

  /// Searches every configured source in order and merges the links without repeats.
  ///
  /// A failing source is logged and contributes nothing.
  pub async fn search(&self, config: &SearchConfig, query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for &source in &config.sources {
      match self.search_source(source, query, config.max_results).await {
        Ok(links) => {
          info!(%source, links = links.len(), "source searched");
          merged.extend(links.into_iter().filter(|link| seen.insert(link.clone())));
        },
        Err(e) => warn!(%source, error = %e, "search failed"),
      }
    }
    merged
  }
}
