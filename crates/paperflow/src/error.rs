//! Error types for the paperflow library.
//!
//! Every fallible operation in the crate returns [`PaperflowError`]. Most variants wrap the
//! error of an underlying library transparently; the rest describe domain failures such as a
//! mailbox without credentials or a record that no longer exists.
//!
//! Errors fall in two groups as far as the pipeline is concerned:
//! - storage errors ([`PaperflowError::is_storage`]) abort a run,
//! - everything else is logged against the record being processed and the record is passed on
//!   unchanged.
//!
//! # Examples
//!
//! ```no_run
//! use paperflow::{database::Database, error::PaperflowError};
//!
//! # async fn example() -> Result<(), PaperflowError> {
//! let mut db = Database::open("papers.db").await?;
//! match db.find_by_id(42).await {
//!   Ok(Some(paper)) => println!("found {}", paper.url_link),
//!   Ok(None) => println!("no such record"),
//!   Err(e) if e.is_storage() => return Err(e),
//!   Err(e) => println!("other error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

/// Error type alias used for the [`paperflow`](crate) crate.
pub type Result<T, E = PaperflowError> = core::result::Result<T, E>;

/// Errors that can occur while harvesting and processing papers.
#[derive(Error, Debug)]
pub enum PaperflowError {
  /// A network request failed.
  ///
  /// This covers unreachable hosts, timeouts, TLS failures and non-success statuses
  /// surfaced through `error_for_status`.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  ///
  /// This wraps errors from the `tokio-rusqlite` crate, covering failures of the background
  /// connection thread as well as errors raised inside `call` closures.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// PDF parsing errors from the lopdf library.
  ///
  /// Raised for malformed, truncated or encrypted documents.
  #[error(transparent)]
  Lopdf(#[from] lopdf::Error),

  /// The configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// The configuration could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// Metadata could not be serialized to or from JSON.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A URL could not be parsed.
  #[error(transparent)]
  Url(#[from] url::ParseError),

  /// An IMAP command failed.
  #[error(transparent)]
  Imap(#[from] async_imap::error::Error),

  /// The configuration is invalid. The string describes the offending setting.
  #[error("Invalid configuration: {0}")]
  Config(String),

  /// Mailbox mode was requested without an account or password.
  #[error("Mailbox account or password is missing")]
  MissingCredentials,

  /// The mailbox connection or a message could not be processed.
  #[error("Mailbox error: {0}")]
  Mail(String),

  /// A harvest produced no records at all.
  #[error("No papers were found")]
  NothingFound,

  /// A model was not specified for the LLM request.
  ///
  /// This occurs when a [`LlamaRequest`](crate::llm::LlamaRequest) is sent without first
  /// calling `with_model()`.
  #[error("No model was chosen for the LLM.")]
  LLMMissingModel,

  /// No messages were provided in the LLM request.
  #[error("No messages were supplied to send to the LLM.")]
  LLMMissingMessage,

  /// No record with the given id exists.
  #[error("No paper with id {0}")]
  NotFound(i64),

  /// Tried to insert a record whose URL is already in the store.
  #[error("Tried to add the url \"{0}\" that was already in the database.")]
  DuplicateUrl(String),
}

impl PaperflowError {
  /// Returns true for errors raised by the record store.
  ///
  /// Storage errors are never swallowed by the pipeline stages.
  pub fn is_storage(&self) -> bool {
    matches!(self, Self::Sqlite(_) | Self::AsyncSqlite(_) | Self::DuplicateUrl(_))
  }
}
