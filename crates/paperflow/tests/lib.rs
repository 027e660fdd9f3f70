use std::{
  error::Error,
  path::Path,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

use paperflow::{
  classify::Classifier,
  config::Config,
  convert::{Converter, TextExtractor},
  database::{Database, SubjectFilter},
  error::PaperflowError,
  fetch::{FetchConfig, PdfFetcher},
  harvest::Harvester,
  pipeline::{run_stage, Pipeline, StageReport},
  prelude::*,
  record::{Field, Fields, Lifecycle, Paper},
  summarize::Summarizer,
};
use tempfile::{tempdir, TempDir};
use tracing_test::traced_test;

mod database;
mod workflows;

pub type TestResult<T> = Result<T, Box<dyn Error>>;

/// Opens a fresh database in its own temporary directory.
pub async fn create_test_database() -> (Database, TempDir) {
  let dir = tempdir().unwrap();
  let db = Database::open(dir.path().join("papers.db")).await.unwrap();
  (db, dir)
}

/// A configuration storing everything under `dir`, without models.
pub fn test_config(dir: &Path) -> Config {
  Config::default().with_database_path(&dir.join("papers.db")).with_storage_path(&dir.join("papers"))
}

/// Returns fixed pages and counts how often it was asked.
#[derive(Clone, Default)]
pub struct CountingExtractor {
  pub pages: Vec<String>,
  pub calls: Arc<AtomicUsize>,
}

impl CountingExtractor {
  pub fn new(pages: &[&str]) -> Self {
    Self { pages: pages.iter().map(|p| p.to_string()).collect(), calls: Arc::default() }
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl TextExtractor for CountingExtractor {
  fn extract_pages(&self, _path: &Path) -> paperflow::error::Result<Vec<String>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.pages.clone())
  }
}
