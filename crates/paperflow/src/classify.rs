//! Metadata, topic labels and publish dates.
//!
//! The classifier reads the Markdown of each record and derives:
//! - a [`Meta`] summary of the document (title, keywords, a short summary and the first page),
//! - the record subject, either the labels a [`TextGenerator`] picked from the configured pool
//!   or a fixed subject,
//! - a publish date found in the metadata text.
//!
//! Without a generator everything is heuristic; a failing generator is treated the same way.

use super::*;
use crate::llm::SummaryStyle;

/// Lines of the document kept as the first page.
const FIRST_PAGE_LINES: usize = 60;

/// Cap on the heuristic summary.
const MAX_SUMMARY_CHARS: usize = 1200;

/// Heuristic summary length when the document has no paragraph break.
const FALLBACK_SUMMARY_CHARS: usize = 600;

lazy_static! {
  /// A `Keywords:` style line, English or Chinese.
  static ref KEYWORDS: Regex = Regex::new(r"(?i)(?:关键词|Keywords?)\s*[:：]\s*(.+)").unwrap();
  /// Paragraph separator.
  static ref BLANK_LINE: Regex = Regex::new(r"\n\s*\n").unwrap();
  /// `YYYY-MM-DD` with `-`, `/` or `.` separators.
  static ref FULL_DATE: Regex =
    Regex::new(r"([0-9]{4})[-/.]([0-9]{1,2})[-/.]([0-9]{1,2})").unwrap();
  /// A standalone year between 1900 and 2099.
  static ref YEAR: Regex = Regex::new(r"(?-u:\b)((?:19|20)[0-9]{2})(?-u:\b)").unwrap();
}

/// Heuristic document metadata, stored as JSON in the `meta` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
  /// Text of the first `# ` heading
  pub title:      String,
  /// Text after the first `Keywords:` label
  pub keywords:   String,
  /// First paragraph, or a generated summary
  pub summary:    String,
  /// First non-empty lines of the document
  pub first_page: String,
}

impl Meta {
  /// The text publish dates are searched in.
  pub fn search_text(&self) -> String {
    format!(
      "Title: {}\nKeywords: {}\nSummary: {}\n{}",
      self.title, self.keywords, self.summary, self.first_page
    )
  }
}

/// Derives [`Meta`] from a Markdown document.
pub fn extract_meta(content: &str) -> Meta {
  let lines: Vec<&str> = content.lines().map(str::trim).collect();

  let title = lines
    .iter()
    .find_map(|line| line.strip_prefix("# "))
    .map(|title| title.trim().to_string())
    .unwrap_or_default();
  let keywords = lines
    .iter()
    .find_map(|line| KEYWORDS.captures(line))
    .map(|c| c[1].trim().to_string())
    .unwrap_or_default();
  let first_page = lines
    .iter()
    .filter(|line| !line.is_empty())
    .take(FIRST_PAGE_LINES)
    .copied()
    .collect::<Vec<_>>()
    .join("\n");

  let text = lines.join("\n");
  let summary = match BLANK_LINE.split(&text).map(str::trim).find(|p| !p.is_empty()) {
    Some(paragraph) => llm::truncate_chars(paragraph, MAX_SUMMARY_CHARS).to_string(),
    None => llm::truncate_chars(&text, FALLBACK_SUMMARY_CHARS).to_string(),
  };

  Meta { title, keywords, summary, first_page }
}

/// Finds a publish date in `text`.
///
/// A full date wins and is normalized to `YYYY-MM-DD`; otherwise a bare year is returned.
///
/// ```
/// use paperflow::classify::extract_publish_time;
///
/// assert_eq!(extract_publish_time("Received 2024/3/5").as_deref(), Some("2024-03-05"));
/// assert_eq!(extract_publish_time("© 2021年 Elsevier").as_deref(), Some("2021"));
/// assert_eq!(extract_publish_time("no date here"), None);
/// ```
pub fn extract_publish_time(text: &str) -> Option<String> {
  let full_date = FULL_DATE.captures_iter(text).find_map(|c| {
    let month: u32 = c[2].parse().ok()?;
    let day: u32 = c[3].parse().ok()?;
    ((1..=12).contains(&month) && (1..=31).contains(&day))
      .then(|| format!("{}-{month:02}-{day:02}", &c[1]))
  });
  full_date.or_else(|| YEAR.captures(text).map(|c| c[1].to_string()))
}

/// The classification stage.
#[derive(Clone, Default)]
pub struct Classifier {
  /// Label pool offered to the generator
  labels:    Vec<String>,
  /// Subject used when no label was selected
  subject:   Option<String>,
  /// Optional model
  generator: Option<Arc<dyn TextGenerator>>,
}

impl Classifier {
  /// A classifier choosing from `labels`.
  pub fn new(labels: Vec<String>) -> Self { Self { labels, ..Self::default() } }

  /// Sets the fixed subject.
  pub fn with_subject(mut self, subject: Option<String>) -> Self {
    self.subject = subject.filter(|s| !s.trim().is_empty());
    self
  }

  /// Sets the text generator.
  pub fn with_generator(mut self, generator: Option<Arc<dyn TextGenerator>>) -> Self {
    self.generator = generator;
    self
  }

  /// The configured label pool.
  pub fn labels(&self) -> &[String] { &self.labels }

  /// Asks the generator for labels and a short summary. Failures count as "no answer".
  async fn consult(&self, generator: &dyn TextGenerator, meta: &mut Meta) -> Vec<String> {
    let labels = if self.labels.is_empty() {
      Vec::new()
    } else {
      generator.classify(&meta.first_page, &self.labels).await.unwrap_or_else(|e| {
        warn!(error = %e, "label selection failed");
        Vec::new()
      })
    };

    match generator.summarize(&meta.first_page, SummaryStyle::Brief).await {
      Ok(summary) if !summary.is_empty() => meta.summary = summary,
      Ok(_) => debug!("empty summary from model, keeping heuristic summary"),
      Err(e) => warn!(error = %e, "summary generation failed"),
    }
    labels
  }
}

#[async_trait]
impl Stage for Classifier {
  fn name(&self) -> &'static str { "classify" }

  async fn process(&self, db: &mut Database, paper: &mut Paper) -> Result<Outcome> {
    let (Some(id), Some(md)) = (paper.id, paper.md_link.clone().filter(|p| p.exists())) else {
      debug!(id = ?paper.id, url = %paper.url_link, "no markdown to classify");
      return Ok(Outcome::Skipped);
    };
    let content = match tokio::fs::read_to_string(&md).await {
      Ok(content) => content,
      Err(e) => {
        warn!(id, path = %md.display(), error = %e, "unreadable markdown");
        return Ok(Outcome::Skipped);
      },
    };

    let mut meta = extract_meta(&content);
    let labels = match &self.generator {
      Some(generator) => self.consult(generator.as_ref(), &mut meta).await,
      None => Vec::new(),
    };

    let subject = if labels.is_empty() {
      self.subject.clone().or_else(|| paper.subject.clone())
    } else {
      Some(labels.join(","))
    };
    let publish_time =
      extract_publish_time(&meta.search_text()).or_else(|| paper.publish_time.clone());

    let meta = serde_json::to_string(&meta)?;
    let unchanged = paper.meta.as_deref() == Some(meta.as_str())
      && (subject.is_none() || subject == paper.subject)
      && (publish_time.is_none() || publish_time == paper.publish_time);
    if unchanged {
      debug!(id, "classification unchanged");
      return Ok(Outcome::Reused);
    }

    let fields = Fields::new()
      .with(Field::Meta, meta)
      .with_opt(Field::Subject, subject)
      .with_opt(Field::PublishTime, publish_time);
    db.update_fields(id, &fields).await?;
    paper.apply(&fields);
    info!(
      id,
      subject = paper.subject.as_deref().unwrap_or_default(),
      publish_time = paper.publish_time.as_deref().unwrap_or_default(),
      "classified"
    );
    Ok(Outcome::Generated)
  }
}
