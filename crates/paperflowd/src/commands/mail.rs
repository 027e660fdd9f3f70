use super::*;

/// Function for the [`Commands::Mail`] in the CLI.
pub async fn mail(cli: &Cli) -> Result<()> {
  let (pipeline, mut db) = open_pipeline(cli).await?;
  cli.reply(ResponseContent::Info(&format!(
    "Reading Scholar alerts from {}",
    pipeline.config().mailbox.imap_server
  )))?;
  let (papers, report) = pipeline.run_mailbox(&mut db).await?;
  report_run(cli, &papers, &report)
}
