//! PDF to Markdown conversion.
//!
//! Text is pulled out page by page through a [`TextExtractor`] and normalized by
//! [`to_markdown`]. The result is written next to the PDF with an `.md` extension.

use lopdf::Document;

use super::*;

/// Pages shorter than this (in characters) may become headings.
const MAX_HEADING_CHARS: usize = 120;

/// Written when no text could be extracted.
const EMPTY_DOCUMENT: &str = "# 内容解析失败\n\n";

/// Pulls plain text out of a PDF, one string per page.
pub trait TextExtractor: Send + Sync {
  /// Extracts the text of every page of the file at `path`.
  fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// [`TextExtractor`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
  fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
    let doc = Document::load(path)?;
    let mut pages = Vec::new();
    for page_number in doc.get_pages().into_keys() {
      match doc.extract_text(&[page_number]) {
        Ok(text) => pages.push(text),
        Err(e) => {
          debug!(path = %path.display(), page = page_number, error = %e, "unreadable page");
          pages.push(String::new());
        },
      }
    }
    Ok(pages)
  }
}

/// Title casing: the first cased letter of every run of cased letters is upper
/// case, the rest lower case.
fn title_case(line: &str) -> String {
  let mut out = String::with_capacity(line.len());
  let mut in_word = false;
  for c in line.chars() {
    if in_word {
      out.extend(c.to_lowercase());
    } else {
      out.extend(c.to_uppercase());
    }
    in_word = c.is_uppercase() || c.is_lowercase();
  }
  out
}

/// Has at least one cased letter and no lower case one.
fn is_all_caps(line: &str) -> bool {
  line.chars().any(char::is_uppercase) && !line.chars().any(char::is_lowercase)
}

/// Normalizes extracted text into Markdown.
///
/// Lines are trimmed and blank lines kept. A short all-caps line becomes a title-cased `#`
/// heading. The first non-empty line becomes a heading as-is when it is short and not already
/// an all-caps heading. Empty input yields a placeholder heading.
///
/// ```
/// use paperflow::convert::to_markdown;
///
/// let text = "Deep Hedging\n\nABSTRACT\nWe study hedging.";
/// assert_eq!(to_markdown(text), "# Deep Hedging\n\n# Abstract\nWe study hedging.\n");
/// ```
pub fn to_markdown(text: &str) -> String {
  if text.trim().is_empty() {
    return EMPTY_DOCUMENT.to_string();
  }

  let mut first = true;
  let mut lines = Vec::new();
  for line in text.lines().map(str::trim) {
    if line.is_empty() {
      lines.push(String::new());
      continue;
    }

    let short = line.chars().count() < MAX_HEADING_CHARS;
    if short && is_all_caps(line) {
      lines.push(format!("# {}", title_case(line)));
    } else if short && first {
      lines.push(format!("# {line}"));
    } else {
      lines.push(line.to_string());
    }
    first = false;
  }
  lines.join("\n") + "\n"
}

/// The conversion stage.
#[derive(Clone)]
pub struct Converter {
  /// PDF text source
  extractor: Arc<dyn TextExtractor>,
}

impl Default for Converter {
  fn default() -> Self { Self::new() }
}

impl Converter {
  /// A converter using [`LopdfExtractor`].
  pub fn new() -> Self { Self { extractor: Arc::new(LopdfExtractor) } }

  /// Replaces the text extractor.
  pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
    self.extractor = Arc::new(extractor);
    self
  }

  /// Extracts and normalizes the text of `pdf`. Extraction failures give the placeholder.
  pub fn render(&self, pdf: &Path) -> String {
    let text = match self.extractor.extract_pages(pdf) {
      Ok(pages) => pages.join("\n\n"),
      Err(e) => {
        error!(path = %pdf.display(), error = %e, "pdf text extraction failed");
        String::new()
      },
    };
    to_markdown(&text)
  }
}

#[async_trait]
impl Stage for Converter {
  fn name(&self) -> &'static str { "convert" }

  async fn process(&self, db: &mut Database, paper: &mut Paper) -> Result<Outcome> {
    if paper.has_markdown() {
      return Ok(Outcome::Reused);
    }
    let (Some(id), Some(pdf)) = (paper.id, paper.pdf_link.clone().filter(|p| p.exists())) else {
      debug!(id = ?paper.id, url = %paper.url_link, "no pdf to convert");
      return Ok(Outcome::Skipped);
    };

    let md_path = pdf.with_extension("md");
    let outcome = if md_path.exists() {
      debug!(id, path = %md_path.display(), "reusing markdown");
      Outcome::Reused
    } else {
      let markdown = self.render(&pdf);
      tokio::fs::write(&md_path, &markdown).await?;
      info!(id, path = %md_path.display(), chars = markdown.chars().count(), "markdown written");
      Outcome::Generated
    };

    let fields = Fields::new().with_path(Field::MdLink, &md_path);
    db.update_fields(id, &fields).await?;
    paper.apply(&fields);
    Ok(outcome)
  }
}
