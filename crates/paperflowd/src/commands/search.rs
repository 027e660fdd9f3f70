//! Module for the web search harvest.

use super::*;

/// Options for [`Commands::Search`].
#[derive(Args, Clone)]
pub struct SearchOptions {
  /// Search query sent to every configured source
  pub query:   String,
  /// Subject stored on new records and used when no label is selected
  #[arg(long)]
  pub subject: Option<String>,
}

/// Function for the [`Commands::Search`] in the CLI.
pub async fn search(cli: &Cli, options: SearchOptions) -> Result<()> {
  let SearchOptions { query, subject } = options;
  let (pipeline, mut db) = open_pipeline(cli).await?;

  cli.reply(ResponseContent::Info(&format!("Searching for: {query}")))?;
  let (papers, report) = pipeline.run_search(&mut db, &query, subject.as_deref()).await?;
  report_run(cli, &papers, &report)
}
