use super::*;

/// Options for [`Commands::Remove`].
#[derive(Args, Clone)]
pub struct RemoveOptions {
  /// Id of the record, as shown by `list`
  pub id:      i64,
  /// Show what would be removed without removing it
  #[arg(long)]
  pub dry_run: bool,
}

/// Function for the [`Commands::Remove`] in the CLI.
///
/// Only the record is removed; files on disk are left in place.
pub async fn remove(cli: &Cli, options: RemoveOptions) -> Result<()> {
  let RemoveOptions { id, dry_run } = options;
  let config = cli.load_config()?;
  let mut db = Database::open(&config.database_path).await?;

  let Some(paper) = db.find_by_id(id).await? else {
    return Err(PaperflowError::NotFound(id).into());
  };
  cli.reply(ResponseContent::Paper(&paper))?;

  if dry_run {
    Remove::by_id(id).dry_run().execute(&mut db).await?;
    return cli.reply(ResponseContent::Info(&format!("Would remove paper {id}")));
  }

  if !cli.confirm(&format!("Remove paper {id}?"))? {
    return cli.reply(ResponseContent::Info("Operation cancelled"));
  }
  Remove::by_id(id).execute(&mut db).await?;
  cli.reply(ResponseContent::Success(&format!("Removed paper {id}")))
}
