//! Module for abstracting the "clean" functionality to the paperflow database.

use super::*;

/// SQLite side files removed together with the database.
const SIDE_FILES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Function for the [`Commands::Clean`] in the CLI.
///
/// Downloaded documents are left in place.
pub async fn clean(cli: &Cli) -> Result<()> {
  let path = cli.load_config()?.database_path;
  if !path.exists() {
    return cli
      .reply(ResponseContent::Warning(&format!("No database found at: {}", path.display())));
  }
  cli.reply(ResponseContent::Warning(&format!("Database found at: {}", path.display())))?;

  // Skip confirmations if force flag is set
  if !cli.accept_defaults {
    if !cli.confirm("Are you sure you want to delete this database?")? {
      return cli.reply(ResponseContent::Info("Operation cancelled"));
    }

    // Require typing DELETE for final confirmation
    let input = cli.prompt(&format!("Type {} to confirm deletion", style("DELETE").red().bold()))?;
    if input != "DELETE" {
      return cli.reply(ResponseContent::Info("Operation cancelled"));
    }
  }

  std::fs::remove_file(&path)?;
  for suffix in SIDE_FILES {
    let mut side = path.clone().into_os_string();
    side.push(suffix);
    let side = PathBuf::from(side);
    if side.exists() {
      std::fs::remove_file(&side)?;
    }
  }
  cli.reply(ResponseContent::Success("Database files cleaned"))
}
