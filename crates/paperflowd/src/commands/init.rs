//! Module for setting up a paperflow environment

use super::*;

/// Options for [`Commands::Init`].
#[derive(Args, Clone)]
pub struct InitOptions {
  /// Where the SQLite database is created
  #[arg(long)]
  pub database_path: Option<PathBuf>,
  /// Where downloaded PDFs and their documents are stored
  #[arg(long)]
  pub storage_path:  Option<PathBuf>,
  /// Topic labels offered to the classifier, comma separated
  #[arg(long, value_delimiter = ',')]
  pub labels:        Vec<String>,
}

/// Function for the [`Commands::Init`] in the CLI.
pub async fn init(cli: &Cli, options: InitOptions) -> Result<()> {
  let InitOptions { database_path, storage_path, labels } = options;
  let config_path = cli.config_path();

  if config_path.exists()
    && !cli.confirm(&format!(
      "A configuration already exists at {}, do you want to overwrite it?",
      config_path.display()
    ))?
  {
    cli.reply(ResponseContent::Info("Keeping the existing configuration"))?;
    return Ok(());
  }

  let config = match database_path {
    Some(path) => Config::default().with_database_path(&path),
    None => {
      let config = Config::default();
      if !confirm_default(cli, "storing the paper database", &config.database_path)? {
        cli.reply(ResponseContent::Info(
          "Please pass in your intended database path using --database-path",
        ))?;
        return Ok(());
      }
      config
    },
  };

  let config = match storage_path {
    Some(path) => config.with_storage_path(&path),
    None => {
      if !confirm_default(cli, "storing documents", &config.storage_path)? {
        cli.reply(ResponseContent::Info(
          "Please pass in your intended document storage path using --storage-path",
        ))?;
        return Ok(());
      }
      config
    },
  };

  let config = if labels.is_empty() { config } else { config.with_labels(labels) };
  config.validate()?;
  config.save(&config_path)?;
  std::fs::create_dir_all(&config.storage_path)?;
  Database::open(&config.database_path).await?;

  cli.reply(ResponseContent::Success(&format!(
    "Initialized paperflow\nConfig path: {}\nDatabase path: {}\nDocument storage path: {}",
    config_path.display(),
    config.database_path.display(),
    config.storage_path.display(),
  )))
}

/// Asks whether the default `path` should be used for `purpose`.
fn confirm_default(cli: &Cli, purpose: &str, path: &Path) -> Result<bool> {
  cli.confirm(&format!("Would you like to use the default path {} for {purpose}?", path.display()))
}
