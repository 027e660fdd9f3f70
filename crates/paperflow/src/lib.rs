//! Academic paper tracking pipeline.
//!
//! `paperflow` follows papers from a bare URL to a summarized Markdown document:
//!
//! 1. **Harvest** candidate URLs from text blobs, a Google Scholar alert mailbox, or a direct web
//!    search ([`harvest`]).
//! 2. **Acquire** a validated PDF for each candidate ([`fetch`]).
//! 3. **Convert** the PDF into normalized Markdown ([`convert`]).
//! 4. **Classify** the document: metadata, topic labels and publish date ([`classify`]).
//! 5. **Summarize** the document into a sibling `.summary.md` file ([`summarize`]).
//!
//! Bookkeeping for every paper lives in a single SQLite table managed by [`database`]. Each
//! stage only fills in what is missing, so re-running the pipeline over the same papers reuses
//! everything that already exists on disk.
//!
//! # Getting Started
//!
//! ```no_run
//! use paperflow::{config::Config, database::Database, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = Config::load(Config::default_path())?;
//!   let mut db = Database::open(&config.database_path).await?;
//!
//!   let pipeline = Pipeline::new(config)?;
//!   let texts = vec!["see https://arxiv.org/pdf/2401.01234.pdf".to_string()];
//!   let (papers, report) = pipeline.run_texts(&mut db, &texts, Some("fintech")).await?;
//!
//!   println!("{} papers processed\n{report}", papers.len());
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`record`]: the paper record and typed partial updates
//! - [`database`]: the record store and its instructions
//! - [`harvest`]: link extraction and the three harvest modes
//! - [`fetch`]: PDF candidate discovery, validation and download
//! - [`convert`]: PDF text extraction and Markdown normalization
//! - [`classify`]: metadata, labels and publish date
//! - [`summarize`]: summary documents
//! - [`llm`]: the text-generation capability backed by Ollama
//! - [`pipeline`]: the stage driver and run reports
//! - [`config`], [`retry`], [`error`]: ambient plumbing

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  fmt::Display,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use url::Url;
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod classify;
pub mod config;
pub mod convert;
pub mod database;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod llm;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod summarize;

use crate::{
  config::Config,
  database::Database,
  error::*,
  llm::TextGenerator,
  pipeline::{Outcome, Stage},
  record::{Field, Fields, Paper},
};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use paperflow::{database::Database, prelude::*, record::Paper};
///
/// async fn example() -> Result<(), PaperflowError> {
///   let mut db = Database::open(Database::default_path()).await?;
///   let paper = Paper::new("https://arxiv.org/abs/2401.01234");
///   Add::new(paper).execute(&mut db).await?;
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    database::{Add, DatabaseInstruction, Query, Remove, Update, Upsert},
    error::PaperflowError,
    harvest::LinkExtractor,
    llm::TextGenerator,
    pipeline::Stage,
  };
}
