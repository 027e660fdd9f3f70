//! Errors surfaced by the `paperflow` command line tool.

use thiserror::Error;

use super::*;

/// Result alias used throughout the CLI.
pub type Result<T, E = PaperflowdError> = core::result::Result<T, E>;

/// Errors that end a CLI command.
#[derive(Error, Debug)]
pub enum PaperflowdError {
  /// An error from the paperflow library.
  #[error(transparent)]
  Paperflow(#[from] PaperflowError),

  /// A file could not be read or removed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A prompt could not be shown or answered.
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// `run` was given neither files nor inline text.
  #[error("Nothing to process: pass text files or --text")]
  NoInput,
}
