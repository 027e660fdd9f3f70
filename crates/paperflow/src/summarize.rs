//! Summary documents.
//!
//! Each converted paper gets a `<name>.summary.md` next to its Markdown. The complex model
//! writes a structured Chinese summary when configured; otherwise, or when it fails, a short
//! heuristic digest of the first page is written instead.

use super::*;
use crate::llm::SummaryStyle;

/// Non-empty lines considered by the heuristic digest.
const DIGEST_WINDOW: usize = 60;

/// Body lines in the heuristic digest.
const DIGEST_LINES: usize = 10;

/// Heuristic summary: the first heading as topic, then the first body lines.
///
/// ```
/// use paperflow::summarize::heuristic_summary;
///
/// let summary = heuristic_summary("# Deep Hedging\n\nWe study hedging.\n# Method\nRL.");
/// assert_eq!(summary, "主题：Deep Hedging\n摘要：\nWe study hedging.\nRL.\n");
/// ```
pub fn heuristic_summary(content: &str) -> String {
  let window: Vec<&str> =
    content.lines().map(str::trim).filter(|l| !l.is_empty()).take(DIGEST_WINDOW).collect();

  let mut lines = Vec::new();
  if let Some(topic) = window.iter().find_map(|l| l.strip_prefix("# ")) {
    lines.push(format!("主题：{}", topic.trim()));
  }
  lines.push("摘要：".to_string());
  lines.extend(
    window.iter().filter(|l| !l.starts_with("# ")).take(DIGEST_LINES).map(|l| l.to_string()),
  );
  lines.join("\n") + "\n"
}

/// Where the summary of `markdown` is written: `paper.md` gives `paper.summary.md`.
pub fn summary_path(markdown: &Path) -> PathBuf { markdown.with_extension("summary.md") }

/// The summarization stage.
#[derive(Clone, Default)]
pub struct Summarizer {
  /// Optional model for structured summaries
  generator: Option<Arc<dyn TextGenerator>>,
}

impl Summarizer {
  /// A summarizer writing heuristic summaries.
  pub fn new() -> Self { Self::default() }

  /// Sets the text generator.
  pub fn with_generator(mut self, generator: Option<Arc<dyn TextGenerator>>) -> Self {
    self.generator = generator;
    self
  }

  /// Produces the summary text for a document, and whether the model wrote it.
  pub async fn summarize(&self, content: &str) -> (String, bool) {
    if let Some(generator) = &self.generator {
      match generator.summarize(content, SummaryStyle::Structured).await {
        Ok(summary) if !summary.is_empty() => {
          let summary = if summary.ends_with('\n') { summary } else { summary + "\n" };
          return (summary, true);
        },
        Ok(_) => warn!("model returned an empty summary"),
        Err(e) => warn!(error = %e, "model summary failed"),
      }
    }
    (heuristic_summary(content), false)
  }
}

#[async_trait]
impl Stage for Summarizer {
  fn name(&self) -> &'static str { "summarize" }

  async fn process(&self, db: &mut Database, paper: &mut Paper) -> Result<Outcome> {
    if paper.has_summary() {
      return Ok(Outcome::Reused);
    }
    let (Some(id), Some(md)) = (paper.id, paper.md_link.clone().filter(|p| p.exists())) else {
      debug!(id = ?paper.id, url = %paper.url_link, "no markdown to summarize");
      return Ok(Outcome::Skipped);
    };

    let target = summary_path(&md);
    let outcome = if target.exists() {
      debug!(id, path = %target.display(), "reusing summary");
      Outcome::Reused
    } else {
      let content = tokio::fs::read_to_string(&md).await?;
      let (summary, used_model) = self.summarize(&content).await;
      tokio::fs::write(&target, summary).await?;
      info!(id, path = %target.display(), used_model, "summary written");
      Outcome::Generated
    };

    let fields = Fields::new().with_path(Field::SummaryLink, &target);
    db.update_fields(id, &fields).await?;
    paper.apply(&fields);
    Ok(outcome)
  }
}
