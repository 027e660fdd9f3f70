//! Module for running the pipeline over text input.

use paperflow::harvest::Harvester;

use super::*;

/// Options for [`Commands::Run`].
#[derive(Args, Clone)]
pub struct RunOptions {
  /// Text files to harvest URLs from
  pub files:        Vec<PathBuf>,
  /// Inline text to harvest URLs from, may be repeated
  #[arg(long)]
  pub text:         Vec<String>,
  /// Subject stored on new records and used when no label is selected
  #[arg(long)]
  pub subject:      Option<String>,
  /// Only record the harvested URLs, skip every later stage
  #[arg(long)]
  pub harvest_only: bool,
}

/// Function for the [`Commands::Run`] in the CLI.
pub async fn run(cli: &Cli, options: RunOptions) -> Result<()> {
  let RunOptions { files, text, subject, harvest_only } = options;

  let mut texts = Vec::with_capacity(files.len() + text.len());
  for file in &files {
    debug!("Reading {}", file.display());
    texts.push(std::fs::read_to_string(file)?);
  }
  texts.extend(text);
  if texts.is_empty() {
    return Err(PaperflowdError::NoInput);
  }

  let (pipeline, mut db) = open_pipeline(cli).await?;
  if harvest_only {
    let papers = Harvester::new().from_texts(&mut db, &texts, subject.as_deref()).await?;
    if papers.is_empty() {
      return Err(PaperflowError::NothingFound.into());
    }
    return cli.reply(ResponseContent::Papers(&papers));
  }

  let (papers, report) = pipeline.run_texts(&mut db, &texts, subject.as_deref()).await?;
  report_run(cli, &papers, &report)
}
