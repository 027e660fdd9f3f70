//! Finding, validating and downloading PDFs.
//!
//! For a record without a PDF on disk, [`PdfFetcher`] works out candidate PDF URLs (the record
//! URL itself when it already looks like a PDF, otherwise the PDF-looking links of the page it
//! points at), checks each candidate in turn and downloads the first one that really is a PDF.
//!
//! A candidate is accepted when a `HEAD` request reports `Content-Type: application/pdf`, or
//! when the first bytes of a `GET` are the `%PDF-` magic marker. Servers that mislabel their
//! PDFs are therefore still accepted while HTML landing pages are rejected.
//!
//! # Examples
//!
//! ```no_run
//! use paperflow::fetch::{FetchConfig, PdfFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = PdfFetcher::new(FetchConfig::new("papers"))?;
//! let url = "https://arxiv.org/pdf/2401.01234";
//! if fetcher.validate(url).await {
//!   let path = fetcher.download(url).await?;
//!   println!("saved to {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use super::*;
use crate::harvest::decode_redirect;

/// Browser-like user agent; several publishers refuse unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, \
                              like Gecko) Chrome/124.0 Safari/537.36";

/// Referer sent with PDF requests.
pub const SCHOLAR_REFERER: &str = "https://scholar.google.com";

/// Accept header for PDF requests.
const ACCEPT_PDF: &str = "application/pdf,application/octet-stream,*/*";

/// Accept header for landing pages.
const ACCEPT_PAGE: &str = "text/html,application/pdf,*/*";

/// First bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Lower bound for download timeouts.
const MIN_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(45);

lazy_static! {
  /// `.pdf` at the end of the path, optionally followed by a query or fragment.
  static ref PDF_SUFFIX: Regex = Regex::new(r"\.pdf($|[#?])").unwrap();
  /// `type=pdf` or `format=pdf` query parameters.
  static ref PDF_PARAM: Regex = Regex::new(r"(type|format)=pdf").unwrap();
  /// Quoted `href` attributes, for markup the HTML parser finds no anchors in.
  static ref HREF: Regex = Regex::new(r#"(?i)href=["']([^"']+)["']"#).unwrap();
}

/// Heuristic check for URLs that point straight at a PDF.
///
/// ```
/// use paperflow::fetch::is_pdf_url;
///
/// assert!(is_pdf_url("https://a.org/paper.PDF?download=1"));
/// assert!(is_pdf_url("https://arxiv.org/pdf/2401.01234"));
/// assert!(is_pdf_url("https://a.org/get?id=7&format=pdf"));
/// assert!(!is_pdf_url("https://arxiv.org/abs/2401.01234"));
/// ```
pub fn is_pdf_url(url: &str) -> bool {
  let lower = url.to_lowercase();
  PDF_SUFFIX.is_match(&lower) || lower.contains("/pdf") || PDF_PARAM.is_match(&lower)
}

/// Derives a file name for a downloaded PDF from its URL.
///
/// The last path segment is used (the host when the path is empty, `paper` as a last resort),
/// `.pdf` is appended when missing and characters outside `[A-Za-z0-9_.-]` become `_`. When
/// fewer than three characters remain before the extension, the name is the first 12 hex digits
/// of the URL's SHA-256 instead.
pub fn safe_filename(url: &str) -> String {
  let parsed = Url::parse(url).ok();
  let base = parsed
    .as_ref()
    .and_then(|u| u.path_segments().and_then(|mut s| s.next_back()).map(str::to_string))
    .filter(|s| !s.is_empty())
    .or_else(|| parsed.as_ref().and_then(|u| u.host_str().map(str::to_string)))
    .unwrap_or_else(|| "paper".to_string());

  let name = if base.to_lowercase().ends_with(".pdf") { base } else { format!("{base}.pdf") };
  let safe: String = name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || "_.-".contains(c) { c } else { '_' })
    .collect();

  let stem = &safe[..safe.len() - ".pdf".len()];
  if stem.trim_matches('_').chars().count() < 3 {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    return format!("{}.pdf", &digest[..12]);
  }
  safe
}

/// Extracts PDF-looking links from an HTML page.
///
/// Anchors whose href mentions `pdf` or passes [`is_pdf_url`] are kept. Google `/url?` redirect
/// hrefs are unwrapped, everything else is resolved against `page_url`. Order is preserved and
/// repeats are dropped.
pub fn extract_pdf_links(page_url: &Url, html: &str) -> Vec<String> {
  let mut hrefs: Vec<String> = match Selector::parse("a[href]") {
    Ok(anchors) => Html::parse_document(html)
      .select(&anchors)
      .filter_map(|a| a.value().attr("href").map(str::to_string))
      .collect(),
    Err(_) => Vec::new(),
  };
  if hrefs.is_empty() {
    hrefs = HREF.captures_iter(html).map(|c| c[1].to_string()).collect();
  }

  let mut seen = HashSet::new();
  hrefs
    .iter()
    .filter(|href| href.to_lowercase().contains("pdf") || is_pdf_url(href))
    .filter_map(|href| {
      if href.starts_with("/url?") {
        Some(decode_redirect(href)).filter(|target| target != href)
      } else {
        page_url.join(href).ok().map(String::from)
      }
    })
    .filter(|link| seen.insert(link.clone()))
    .collect()
}

/// Builds the HTTP client shared by the fetcher and the web search.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
  Ok(reqwest::Client::builder().user_agent(user_agent).timeout(timeout).build()?)
}

/// Settings for [`PdfFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
  /// Directory receiving the PDFs. Created on first download.
  pub download_dir: PathBuf,
  /// Timeout for page, `HEAD` and validation requests.
  pub timeout:      Duration,
  /// User agent for every request.
  pub user_agent:   String,
  /// Referer for PDF requests.
  pub referer:      String,
}

impl FetchConfig {
  /// Default settings downloading into `download_dir`.
  pub fn new(download_dir: impl Into<PathBuf>) -> Self {
    Self {
      download_dir: download_dir.into(),
      timeout:      Duration::from_secs(30),
      user_agent:   USER_AGENT.to_string(),
      referer:      SCHOLAR_REFERER.to_string(),
    }
  }

  /// Settings derived from the pipeline configuration.
  pub fn from_config(config: &Config) -> Self {
    Self::new(&config.storage_path).with_timeout(config.timeout())
  }

  /// Sets the request timeout.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Timeout for the download itself: the request timeout, but at least 45 seconds.
  pub fn download_timeout(&self) -> Duration { self.timeout.max(MIN_DOWNLOAD_TIMEOUT) }
}

/// The acquisition stage: finds and downloads a PDF for each record.
#[derive(Debug, Clone)]
pub struct PdfFetcher {
  /// Shared HTTP client
  client: reqwest::Client,
  /// Settings
  config: FetchConfig,
}

impl PdfFetcher {
  /// Creates a fetcher.
  pub fn new(config: FetchConfig) -> Result<Self> {
    let client = http_client(&config.user_agent, config.timeout)?;
    Ok(Self { client, config })
  }

  /// The settings in use.
  pub fn config(&self) -> &FetchConfig { &self.config }

  /// Candidate PDF URLs for a record URL.
  pub async fn find_candidates(&self, url: &str) -> Result<Vec<String>> {
    if is_pdf_url(url) {
      return Ok(vec![url.to_string()]);
    }

    let response =
      self.client.get(url).header(ACCEPT, ACCEPT_PAGE).send().await?.error_for_status()?;
    if is_pdf_response(&response) {
      return Ok(vec![url.to_string()]);
    }
    let page_url = response.url().clone();
    let html = response.text().await?;
    Ok(extract_pdf_links(&page_url, &html))
  }

  /// Checks whether `url` serves a PDF. Any HTTP failure counts as "no".
  ///
  /// A HEAD answer settles it only with a success status and a PDF content type; anything else
  /// falls through to reading the first bytes of a GET.
  pub async fn validate(&self, url: &str) -> bool {
    let head = self
      .client
      .head(url)
      .header(ACCEPT, ACCEPT_PDF)
      .header(REFERER, &self.config.referer)
      .send()
      .await;
    match head {
      Ok(response) if response.status().is_success() && is_pdf_response(&response) => return true,
      Ok(response) => trace!(url, status = %response.status(), "HEAD did not report a pdf"),
      Err(e) => trace!(url, error = %e, "HEAD failed"),
    }

    match self.starts_with_magic(url).await {
      Ok(is_pdf) => is_pdf,
      Err(e) => {
        debug!(url, error = %e, "validation request failed");
        false
      },
    }
  }

  /// Reads just enough of `url` to compare it with the PDF magic marker.
  async fn starts_with_magic(&self, url: &str) -> Result<bool> {
    let mut response = self
      .client
      .get(url)
      .header(ACCEPT, ACCEPT_PDF)
      .header(REFERER, &self.config.referer)
      .send()
      .await?
      .error_for_status()?;

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    while head.len() < PDF_MAGIC.len() {
      match response.chunk().await? {
        Some(chunk) => head.extend_from_slice(&chunk),
        None => break,
      }
    }
    Ok(head.starts_with(PDF_MAGIC))
  }

  /// Streams `url` into the download directory and returns the file path.
  ///
  /// The name comes from [`safe_filename`]; an existing file is never overwritten, the new one
  /// gets a `_2`, `_3`, ... suffix instead. A partial file is removed when the transfer fails.
  pub async fn download(&self, url: &str) -> Result<PathBuf> {
    let mut response = self
      .client
      .get(url)
      .header(ACCEPT, ACCEPT_PDF)
      .header(REFERER, &self.config.referer)
      .timeout(self.config.download_timeout())
      .send()
      .await?
      .error_for_status()?;

    tokio::fs::create_dir_all(&self.config.download_dir).await?;
    let (path, mut file) = create_unique(&self.config.download_dir, &safe_filename(url)).await?;

    let mut written = 0usize;
    let transfer: Result<()> = async {
      while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
      }
      file.flush().await?;
      Ok(())
    }
    .await;

    if let Err(e) = transfer {
      drop(file);
      if let Err(remove) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %remove, "could not remove partial download");
      }
      return Err(e);
    }

    debug!(url, path = %path.display(), bytes = written, "downloaded pdf");
    Ok(path)
  }
}

/// True when the response declares a PDF body.
fn is_pdf_response(response: &reqwest::Response) -> bool {
  response
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.to_lowercase().contains("application/pdf"))
}

/// Creates `dir/name`, or `dir/<stem>_2.<ext>`, `dir/<stem>_3.<ext>`, ... when taken.
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
  let candidate = Path::new(name);
  let stem = candidate.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  let ext = candidate.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();

  let mut index = 1;
  loop {
    let path = if index == 1 {
      dir.join(name)
    } else {
      dir.join(format!("{stem}_{index}{ext}"))
    };
    match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
      Ok(file) => return Ok((path, file)),
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => index += 1,
      Err(e) => return Err(e.into()),
    }
  }
}

#[async_trait]
impl Stage for PdfFetcher {
  fn name(&self) -> &'static str { "acquire" }

  async fn process(&self, db: &mut Database, paper: &mut Paper) -> Result<Outcome> {
    if paper.has_pdf() {
      return Ok(Outcome::Reused);
    }
    let Some(id) = paper.id else {
      return Ok(Outcome::Skipped);
    };

    let candidates = match self.find_candidates(&paper.url_link).await {
      Ok(candidates) => candidates,
      Err(e) => {
        warn!(id, url = %paper.url_link, error = %e, "could not load page");
        Vec::new()
      },
    };
    trace!(id, candidates = ?candidates, "pdf candidates");

    let mut target = None;
    for candidate in &candidates {
      if self.validate(candidate).await {
        target = Some(candidate);
        break;
      }
    }
    let Some(target) = target else {
      warn!(id, url = %paper.url_link, "no valid pdf found");
      return Ok(Outcome::Skipped);
    };

    let path = self.download(target).await?;
    let fields = Fields::new().with_path(Field::PdfLink, &path);
    db.update_fields(id, &fields).await?;
    paper.apply(&fields);
    info!(id, url = %paper.url_link, path = %path.display(), "pdf acquired");
    Ok(Outcome::Generated)
  }
}
