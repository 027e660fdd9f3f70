//! The stage driver.
//!
//! A [`Pipeline`] runs every record through acquire → convert → classify → summarize. Stages
//! are [`Stage`] implementations that only fill in what is missing, so a second run over the
//! same records reuses the files of the first.
//!
//! Failures are contained per record: when a stage returns an error the record is restored to
//! what it was before the stage, the error is logged with the record's id and url, and the next
//! record is processed. Storage errors are the exception and end the run.
//!
//! # Examples
//!
//! ```no_run
//! use paperflow::{config::Config, database::Database, pipeline::Pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_default(Config::default_path())?;
//! let mut db = Database::open(&config.database_path).await?;
//! let pipeline = Pipeline::new(config)?;
//!
//! let (papers, report) = pipeline.run_mailbox(&mut db).await?;
//! println!("{} papers\n{report}", papers.len());
//! # Ok(())
//! # }
//! ```

use super::*;
use crate::{
  classify::Classifier,
  convert::Converter,
  fetch::{FetchConfig, PdfFetcher},
  harvest::{Harvester, SearchClient},
  llm::OllamaGenerator,
  retry::RetryPolicy,
  summarize::Summarizer,
};

/// What a stage did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// A new artifact was produced.
  Generated,
  /// An existing artifact was found and kept.
  Reused,
  /// The record lacks the input this stage needs.
  Skipped,
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
  /// Short name used in logs and reports.
  fn name(&self) -> &'static str;

  /// Processes one record, persisting and applying any change to it.
  async fn process(&self, db: &mut Database, paper: &mut Paper) -> Result<Outcome>;
}

/// Counters for one stage over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
  /// Records that got a new artifact
  pub generated: usize,
  /// Records whose artifact already existed
  pub reused:    usize,
  /// Records without the required input
  pub skipped:   usize,
  /// Records whose processing failed
  pub failed:    usize,
}

impl StageReport {
  /// Counts one outcome.
  fn record(&mut self, outcome: Outcome) {
    match outcome {
      Outcome::Generated => self.generated += 1,
      Outcome::Reused => self.reused += 1,
      Outcome::Skipped => self.skipped += 1,
    }
  }

  /// Records seen by the stage.
  pub fn total(&self) -> usize { self.generated + self.reused + self.skipped + self.failed }
}

impl Display for StageReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "generated {}, reused {}, skipped {}, failed {}",
      self.generated, self.reused, self.skipped, self.failed
    )
  }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  /// Records the harvest produced
  pub harvested: usize,
  /// Per stage counters, in execution order
  pub stages:    Vec<(&'static str, StageReport)>,
}

impl RunReport {
  /// The counters of the stage called `name`.
  pub fn stage(&self, name: &str) -> Option<&StageReport> {
    self.stages.iter().find(|(stage, _)| *stage == name).map(|(_, report)| report)
  }
}

impl Display for RunReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "harvested {}", self.harvested)?;
    for (name, report) in &self.stages {
      write!(f, "\n{name:>9}: {report}")?;
    }
    Ok(())
  }
}

/// Runs `stage` over every record in order.
pub async fn run_stage(
  stage: &dyn Stage,
  db: &mut Database,
  papers: &mut [Paper],
) -> Result<StageReport> {
  let total = papers.len();
  let mut report = StageReport::default();

  for (index, paper) in papers.iter_mut().enumerate() {
    let before = paper.clone();
    match stage.process(db, paper).await {
      Ok(outcome) => {
        trace!(stage = stage.name(), item = index + 1, total, id = ?paper.id, ?outcome, "done");
        report.record(outcome);
      },
      Err(e) if e.is_storage() => return Err(e),
      Err(e) => {
        *paper = before;
        error!(stage = stage.name(), id = ?paper.id, url = %paper.url_link, error = %e, "failed");
        report.failed += 1;
      },
    }
  }

  info!(stage = stage.name(), %report, "stage finished");
  Ok(report)
}

/// The full paper pipeline, built from a [`Config`].
pub struct Pipeline {
  /// Validated configuration
  config:     Config,
  /// Acquisition stage
  fetcher:    PdfFetcher,
  /// Conversion stage
  converter:  Converter,
  /// Classification stage
  classifier: Classifier,
  /// Summarization stage
  summarizer: Summarizer,
  /// Web search for search mode
  search:     SearchClient,
  /// Mailbox connection retries
  retry:      RetryPolicy,
}

impl Pipeline {
  /// Validates `config` and builds every stage from it.
  pub fn new(config: Config) -> Result<Self> {
    config.validate()?;
    let simple = OllamaGenerator::from_config(config.llm.simple.as_ref())?;
    let complex = OllamaGenerator::from_config(config.llm.complex.as_ref())?;

    Ok(Self {
      fetcher: PdfFetcher::new(FetchConfig::from_config(&config))?,
      converter: Converter::new(),
      classifier: Classifier::new(config.labels.clone())
        .with_subject(config.subject.clone())
        .with_generator(simple),
      summarizer: Summarizer::new().with_generator(complex),
      search: SearchClient::new(config.timeout())?,
      retry: RetryPolicy::default(),
      config,
    })
  }

  /// The configuration the pipeline was built from.
  pub fn config(&self) -> &Config { &self.config }

  /// Replaces the acquisition stage.
  pub fn with_fetcher(mut self, fetcher: PdfFetcher) -> Self {
    self.fetcher = fetcher;
    self
  }

  /// Replaces the conversion stage.
  pub fn with_converter(mut self, converter: Converter) -> Self {
    self.converter = converter;
    self
  }

  /// Replaces the classification stage.
  pub fn with_classifier(mut self, classifier: Classifier) -> Self {
    self.classifier = classifier;
    self
  }

  /// Replaces the summarization stage.
  pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
    self.summarizer = summarizer;
    self
  }

  /// Replaces the search client.
  pub fn with_search_client(mut self, search: SearchClient) -> Self {
    self.search = search;
    self
  }

  /// Replaces the mailbox retry policy.
  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Runs all stages over `papers` and returns them in their final state.
  pub async fn run(
    &self,
    db: &mut Database,
    papers: Vec<Paper>,
  ) -> Result<(Vec<Paper>, RunReport)> {
    self.drive(db, papers, &self.classifier).await
  }

  /// Harvests URLs from text blobs, then runs all stages.
  ///
  /// `subject` is stored on new records and used by the classifier when no label is selected.
  pub async fn run_texts(
    &self,
    db: &mut Database,
    texts: &[String],
    subject: Option<&str>,
  ) -> Result<(Vec<Paper>, RunReport)> {
    let papers = Harvester::new().from_texts(db, texts, subject).await?;
    self.drive(db, papers, &self.classifier_for(subject)).await
  }

  /// Harvests Scholar alert mails, then runs all stages.
  pub async fn run_mailbox(&self, db: &mut Database) -> Result<(Vec<Paper>, RunReport)> {
    let papers =
      Harvester::scholar_alerts().from_mailbox(db, &self.config.mailbox, &self.retry).await?;
    self.drive(db, papers, &self.classifier).await
  }

  /// Searches the web for `query`, then runs all stages.
  pub async fn run_search(
    &self,
    db: &mut Database,
    query: &str,
    subject: Option<&str>,
  ) -> Result<(Vec<Paper>, RunReport)> {
    let papers =
      Harvester::new().from_search(db, &self.search, &self.config.search, query, subject).await?;
    self.drive(db, papers, &self.classifier_for(subject)).await
  }

  /// The classifier with a per-run subject override.
  fn classifier_for(&self, subject: Option<&str>) -> Classifier {
    match subject {
      Some(subject) => self.classifier.clone().with_subject(Some(subject.to_string())),
      None => self.classifier.clone(),
    }
  }

  /// Runs the four stages in order.
  async fn drive(
    &self,
    db: &mut Database,
    mut papers: Vec<Paper>,
    classifier: &Classifier,
  ) -> Result<(Vec<Paper>, RunReport)> {
    let mut report = RunReport { harvested: papers.len(), stages: Vec::new() };
    info!(papers = papers.len(), "starting pipeline");

    let stages: [&dyn Stage; 4] = [&self.fetcher, &self.converter, classifier, &self.summarizer];
    for stage in stages {
      let stage_report = run_stage(stage, db, &mut papers).await?;
      report.stages.push((stage.name(), stage_report));
    }
    Ok((papers, report))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  /// Fails for every record whose url contains "bad", after mutating it.
  struct Flaky(AtomicUsize);

  #[async_trait]
  impl Stage for Flaky {
    fn name(&self) -> &'static str { "flaky" }

    async fn process(&self, _db: &mut Database, paper: &mut Paper) -> Result<Outcome> {
      self.0.fetch_add(1, Ordering::SeqCst);
      paper.subject = Some("touched".into());
      if paper.url_link.contains("bad") {
        return Err(PaperflowError::Config("boom".into()));
      }
      Ok(Outcome::Generated)
    }
  }

  /// Always hits a storage error.
  struct Broken;

  #[async_trait]
  impl Stage for Broken {
    fn name(&self) -> &'static str { "broken" }

    async fn process(&self, _db: &mut Database, _paper: &mut Paper) -> Result<Outcome> {
      Err(PaperflowError::Sqlite(rusqlite::Error::InvalidQuery))
    }
  }

  #[traced_test]
  #[tokio::test]
  async fn test_failed_records_are_restored() {
    let dir = tempdir().unwrap();
    let mut db = Database::open(dir.path().join("papers.db")).await.unwrap();
    let mut papers =
      vec![Paper::new("https://a.org/good"), Paper::new("https://a.org/bad"), Paper::new("x")];

    let stage = Flaky(AtomicUsize::new(0));
    let report = run_stage(&stage, &mut db, &mut papers).await.unwrap();

    assert_eq!(stage.0.load(Ordering::SeqCst), 3);
    assert_eq!(report, StageReport { generated: 2, reused: 0, skipped: 0, failed: 1 });
    assert_eq!(papers[0].subject.as_deref(), Some("touched"));
    assert_eq!(papers[1].subject, None);
    assert!(logs_contain("https://a.org/bad"));
  }

  #[tokio::test]
  async fn test_storage_errors_abort() {
    let dir = tempdir().unwrap();
    let mut db = Database::open(dir.path().join("papers.db")).await.unwrap();
    let mut papers = vec![Paper::new("https://a.org/x")];

    let err = run_stage(&Broken, &mut db, &mut papers).await.unwrap_err();
    assert!(err.is_storage());
  }

  #[test]
  fn test_report_display() {
    let report = RunReport {
      harvested: 2,
      stages:    vec![("acquire", StageReport { generated: 1, reused: 1, skipped: 0, failed: 0 })],
    };
    assert_eq!(
      report.to_string(),
      "harvested 2\n  acquire: generated 1, reused 1, skipped 0, failed 0"
    );
    assert_eq!(report.stage("acquire").unwrap().total(), 2);
    assert!(report.stage("convert").is_none());
  }

  #[test]
  fn test_new_rejects_invalid_config() {
    let config = Config::default().with_timeout(Duration::ZERO);
    assert!(matches!(Pipeline::new(config), Err(PaperflowError::Config(_))));
  }
}
