use super::*;

/// Options for [`Commands::List`].
#[derive(Args, Clone)]
pub struct ListOptions {
  /// Only papers whose subject is exactly this string
  #[arg(long, conflicts_with = "contains")]
  pub subject:  Option<String>,
  /// Only papers carrying this label among their comma-joined subjects
  #[arg(long)]
  pub contains: Option<String>,
}

/// Function for the [`Commands::List`] in the CLI.
pub async fn list(cli: &Cli, options: ListOptions) -> Result<()> {
  let config = cli.load_config()?;
  let mut db = Database::open(&config.database_path).await?;

  let papers = db.list(SubjectFilter::from_options(options.subject, options.contains)).await?;
  if papers.is_empty() {
    cli.reply(ResponseContent::Info("No papers found"))
  } else {
    cli.reply(ResponseContent::Papers(&papers))
  }
}
