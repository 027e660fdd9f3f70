//! Subcommands of the `paperflow` binary.

use super::*;

pub mod clean;
pub mod init;
pub mod list;
pub mod mail;
pub mod remove;
pub mod run;
pub mod search;

pub use clean::clean;
pub use init::{init, InitOptions};
pub use list::{list, ListOptions};
pub use mail::mail;
pub use remove::{remove, RemoveOptions};
pub use run::{run, RunOptions};
pub use search::{search, SearchOptions};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a configuration file and create the paper database
  Init(InitOptions),

  /// Run the pipeline over URLs found in text files or inline text
  Run(RunOptions),

  /// Run the pipeline over recent Google Scholar alert mails
  Mail,

  /// Search the web for papers and run the pipeline over the results
  Search(SearchOptions),

  /// List tracked papers, newest first
  List(ListOptions),

  /// Remove a paper record by id
  Remove(RemoveOptions),

  /// Removes the entire database after confirmation
  Clean,
}

/// Opens the store and builds the pipeline from the loaded configuration.
async fn open_pipeline(cli: &Cli) -> Result<(Pipeline, Database)> {
  let config = cli.load_config()?;
  let db = Database::open(&config.database_path).await?;
  Ok((Pipeline::new(config)?, db))
}

/// Reports the outcome of a pipeline run. An empty harvest is an error.
fn report_run<I: UserInteraction>(
  interaction: &I,
  papers: &[Paper],
  report: &RunReport,
) -> Result<()> {
  if papers.is_empty() {
    return Err(PaperflowError::NothingFound.into());
  }
  interaction.reply(ResponseContent::Papers(papers))?;
  interaction.reply(ResponseContent::Report(report))
}
