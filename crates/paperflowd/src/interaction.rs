//! Terminal output and prompts.
//!
//! Commands talk to the user only through [`UserInteraction`], implemented for [`Cli`] so that
//! `--accept-defaults` answers every confirmation with "yes".

use dialoguer::{Confirm, Input};

use super::*;

/// Prefix for information messages
pub static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
pub static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for error messages
pub static ERROR_PREFIX: &str = "✗ ";
/// Prefix for warning messages
pub static WARNING_PREFIX: &str = "! ";
/// Prefix for user prompts
pub static PROMPT_PREFIX: &str = "❯ ";
/// Prefix for list items
pub static ITEM_PREFIX: &str = "├─";
/// Prefix for the last item of a list
pub static LAST_ITEM_PREFIX: &str = "└─";
/// Continuation line under a list item
pub static CONTINUE_PREFIX: &str = "│  ";

/// Something to show the user.
#[derive(Debug)]
pub enum ResponseContent<'a> {
  /// One paper in detail
  Paper(&'a Paper),
  /// A list of papers
  Papers(&'a [Paper]),
  /// Per-stage counters of a pipeline run
  Report(&'a RunReport),
  /// A completed action
  Success(&'a str),
  /// Something that did not work but did not end the command
  Warning(&'a str),
  /// A failed command
  Error(PaperflowdError),
  /// Neutral information
  Info(&'a str),
}

/// The ways a command interacts with its user.
pub trait UserInteraction {
  /// Asks a yes/no question.
  fn confirm(&self, message: &str) -> Result<bool>;
  /// Asks for free text.
  fn prompt(&self, message: &str) -> Result<String>;
  /// Shows `content`.
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

impl UserInteraction for Cli {
  fn confirm(&self, message: &str) -> Result<bool> {
    if self.accept_defaults {
      return Ok(true);
    }
    Ok(
      Confirm::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .default(false)
        .wait_for_newline(true)
        .interact()?,
    )
  }

  fn prompt(&self, message: &str) -> Result<String> {
    Ok(
      Input::<String>::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .interact_text()?,
    )
  }

  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Paper(paper) => print_paper(paper, true),
      ResponseContent::Papers(papers) => {
        println!("{}Found {} papers:", style(INFO_PREFIX).cyan(), style(papers.len()).yellow());
        for (i, paper) in papers.iter().enumerate() {
          print_paper(paper, i + 1 == papers.len());
        }
      },
      ResponseContent::Report(report) => {
        for line in report.to_string().lines() {
          println!("{}{line}", style(INFO_PREFIX).cyan());
        }
      },
      ResponseContent::Success(message) => {
        println!("{}{}", style(SUCCESS_PREFIX).green(), style(message).green())
      },
      ResponseContent::Warning(message) => {
        println!("{}{}", style(WARNING_PREFIX).yellow(), style(message).yellow())
      },
      ResponseContent::Error(error) => {
        eprintln!("{}{}", style(ERROR_PREFIX).red(), style(error).red())
      },
      ResponseContent::Info(message) => println!("{}{message}", style(INFO_PREFIX).cyan()),
    }
    Ok(())
  }
}

/// Prints one paper as a tree item.
fn print_paper(paper: &Paper, last: bool) {
  let prefix = if last { LAST_ITEM_PREFIX } else { ITEM_PREFIX };
  let id = paper.id.map_or_else(|| "-".to_string(), |id| id.to_string());
  println!(
    "{} [{}] {} ({})",
    style(prefix).dim(),
    style(id).yellow(),
    paper.url_link,
    style(paper.stage()).cyan()
  );

  let continuation = if last { "   " } else { CONTINUE_PREFIX };
  if let Some(subject) = &paper.subject {
    println!("{}  subject: {subject}", style(continuation).dim());
  }
  if let Some(published) = &paper.publish_time {
    println!("{}  published: {published}", style(continuation).dim());
  }
  for (label, path) in
    [("pdf", &paper.pdf_link), ("markdown", &paper.md_link), ("summary", &paper.summary_link)]
  {
    if let Some(path) = path {
      println!("{}  {label}: {}", style(continuation).dim(), path.display());
    }
  }
}
