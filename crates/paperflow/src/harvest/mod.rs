//! Harvesting candidate paper URLs.
//!
//! A harvest turns some source of text into a list of [`Paper`] records, one per distinct URL,
//! in first-seen order. URLs already in the store reuse their existing record; new ones are
//! inserted. Three sources are supported:
//!
//! - free text blobs ([`Harvester::from_texts`]),
//! - a Google Scholar alert mailbox over IMAP ([`Harvester::from_mailbox`]),
//! - a direct web search across arXiv, Google Scholar and Google ([`Harvester::from_search`]).
//!
//! How URLs are pulled out of text is decided by a [`LinkExtractor`]. [`RegexExtractor`] finds
//! bare URLs; [`ScholarAlertExtractor`] understands the HTML of alert mails and unwraps their
//! redirect links.

use std::collections::HashSet;

use scraper::{Html, Selector};

use super::*;
use crate::config::{MailboxConfig, SearchConfig};

pub mod mailbox;
pub mod search;

pub use self::{mailbox::MailboxReport, search::SearchClient};

lazy_static! {
  /// Bare http(s) URLs.
  static ref URL_PATTERN: Regex = Regex::new(r#"https?://[^\s<>"]+"#).unwrap();
}

/// Punctuation that commonly trails a URL in prose.
const TRAILING_PUNCTUATION: &[char] = &[')', '.', ',', ';', '"', '\''];

/// Class marker of the title anchors in Google Scholar alert mails.
const ALERT_TITLE_CLASS: &str = "gse_alrt_title";

/// Base used to resolve relative redirect links found in alert mails.
const SCHOLAR_BASE: &str = "https://scholar.google.com/";

/// Pulls candidate URLs out of a piece of text.
pub trait LinkExtractor: Send + Sync {
  /// Returns the URLs found in `text`, deduplicated, in order of first appearance.
  fn extract(&self, text: &str) -> Vec<String>;
}

/// Finds bare `http(s)://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtractor;

impl LinkExtractor for RegexExtractor {
  fn extract(&self, text: &str) -> Vec<String> {
    dedup(URL_PATTERN.find_iter(text).map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION)))
  }
}

/// Understands Google Scholar alert HTML.
///
/// Takes the anchors whose class contains `gse_alrt_title`, unwraps Scholar redirect links and
/// keeps only `http(s)` targets. When the text has no such anchor it behaves like
/// [`RegexExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScholarAlertExtractor;

impl LinkExtractor for ScholarAlertExtractor {
  fn extract(&self, text: &str) -> Vec<String> {
    let Ok(anchors) = Selector::parse("a[href]") else {
      return RegexExtractor.extract(text);
    };

    let document = Html::parse_document(text);
    let links: Vec<String> = document
      .select(&anchors)
      .filter(|a| a.value().classes().any(|c| c.contains(ALERT_TITLE_CLASS)))
      .filter_map(|a| a.value().attr("href"))
      .map(decode_redirect)
      .filter(|href| href.starts_with("http"))
      .collect();

    if links.is_empty() {
      trace!("no alert title anchors, falling back to plain url extraction");
      RegexExtractor.extract(text)
    } else {
      dedup(links.iter().map(String::as_str))
    }
  }
}

/// Unwraps a redirect link to its target.
///
/// The target is taken from the `url` query parameter, then `q`. Relative links are resolved
/// against Google Scholar. Anything else is returned unchanged.
///
/// ```
/// use paperflow::harvest::decode_redirect;
///
/// let href = "/scholar_url?url=https://arxiv.org/pdf/2401.01234.pdf&hl=en";
/// assert_eq!(decode_redirect(href), "https://arxiv.org/pdf/2401.01234.pdf");
/// assert_eq!(decode_redirect("https://a.org/x.pdf"), "https://a.org/x.pdf");
/// ```
pub fn decode_redirect(href: &str) -> String {
  let parsed = Url::parse(href).or_else(|_| Url::parse(SCHOLAR_BASE).and_then(|b| b.join(href)));
  let Ok(parsed) = parsed else {
    return href.to_string();
  };

  for key in ["url", "q"] {
    if let Some((_, target)) = parsed.query_pairs().find(|(k, v)| k == key && !v.is_empty()) {
      return target.into_owned();
    }
  }
  href.to_string()
}

/// Removes repeats, keeping the first occurrence.
fn dedup<'a>(links: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut seen = HashSet::new();
  links.filter(|l| !l.is_empty() && seen.insert(*l)).map(str::to_string).collect()
}

/// Turns text sources into stored paper records.
pub struct Harvester {
  /// Strategy for finding URLs in text
  extractor: Box<dyn LinkExtractor>,
}

impl Default for Harvester {
  fn default() -> Self { Self::new() }
}

impl Harvester {
  /// A harvester using [`RegexExtractor`].
  pub fn new() -> Self { Self { extractor: Box::new(RegexExtractor) } }

  /// A harvester using [`ScholarAlertExtractor`], as used for mailbox mode.
  pub fn scholar_alerts() -> Self { Self { extractor: Box::new(ScholarAlertExtractor) } }

  /// Replaces the extraction strategy.
  pub fn with_extractor(mut self, extractor: impl LinkExtractor + 'static) -> Self {
    self.extractor = Box::new(extractor);
    self
  }

  /// Extracts URLs from each text blob and records them.
  ///
  /// New records get `subject`. Existing records without a subject have it backfilled.
  pub async fn from_texts(
    &self,
    db: &mut Database,
    texts: &[String],
    subject: Option<&str>,
  ) -> Result<Vec<Paper>> {
    let urls: Vec<String> = texts.iter().flat_map(|text| self.extractor.extract(text)).collect();
    info!(texts = texts.len(), urls = urls.len(), "extracted urls from text");
    record_urls(db, urls, subject).await
  }

  /// Reads Scholar alert mails and records the links they contain.
  ///
  /// Missing credentials are an error. A connection that cannot be established after all
  /// retries is logged and yields an empty list.
  pub async fn from_mailbox(
    &self,
    db: &mut Database,
    config: &MailboxConfig,
    policy: &retry::RetryPolicy,
  ) -> Result<Vec<Paper>> {
    let credentials = config.credentials()?;
    let bodies = match mailbox::fetch_alert_bodies(config, credentials, policy).await {
      Ok((bodies, report)) => {
        info!(%report, "mailbox scan finished");
        bodies
      },
      Err(e) => {
        error!(server = %config.imap_server, error = %e, "could not read the mailbox");
        return Ok(Vec::new());
      },
    };

    let urls: Vec<String> = bodies.iter().flat_map(|body| self.extractor.extract(body)).collect();
    info!(messages = bodies.len(), urls = urls.len(), "extracted urls from mail");
    record_urls(db, urls, None).await
  }

  /// Searches the configured web sources for `query` and records the PDF links found.
  pub async fn from_search(
    &self,
    db: &mut Database,
    client: &SearchClient,
    config: &SearchConfig,
    query: &str,
    subject: Option<&str>,
  ) -> Result<Vec<Paper>> {
    let urls = client.search(config, query).await;
    info!(query, urls = urls.len(), "search finished");
    record_urls(db, urls, subject).await
  }
}

/// Reuses or inserts a record per distinct URL, preserving order.
async fn record_urls(
  db: &mut Database,
  urls: impl IntoIterator<Item = String>,
  subject: Option<&str>,
) -> Result<Vec<Paper>> {
  let mut seen = HashSet::new();
  let mut papers = Vec::new();

  for url in urls {
    if !seen.insert(url.clone()) {
      continue;
    }

    match db.find_by_url(&url).await? {
      Some(mut paper) => {
        match (subject, paper.id) {
          (Some(subject), Some(id)) if paper.subject.is_none() => {
            let fields = Fields::new().with(Field::Subject, subject);
            db.update_fields(id, &fields).await?;
            paper.apply(&fields);
            debug!(id, url = %url, subject, "backfilled subject");
          },
          _ => {},
        }
        trace!(id = ?paper.id, url = %url, "reusing record");
        papers.push(paper);
      },
      None => {
        let mut paper = Paper::new(url);
        paper.subject = subject.map(str::to_string);
        paper.id = Some(db.insert(&paper).await?);
        debug!(id = ?paper.id, url = %paper.url_link, "new record");
        papers.push(paper);
      },
    }
  }
  Ok(papers)
}
