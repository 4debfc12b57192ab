//! Everything the CLI shows to or asks of the user.
//!
//! Commands talk to the user only through [`UserInteraction`], so the hidden `--accept-defaults`
//! flag can turn every prompt into its default answer.

use console::Term;
use dialoguer::{Confirm, Input};

use super::*;

/// Prefix for information messages
pub static INFO_PREFIX: &str = "ℹ ";
/// Prefix for in-progress messages
pub static WORKING_PREFIX: &str = "» ";
/// Prefix for success messages
pub static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for error messages
pub static ERROR_PREFIX: &str = "✗ ";
/// Prefix for warning messages
pub static WARNING_PREFIX: &str = "! ";
/// Prefix for list items
pub static ITEM_PREFIX: &str = "├─";
/// Prefix for the last item of a list
pub static LAST_ITEM_PREFIX: &str = "└─";

/// Something to show the user.
#[derive(Debug)]
pub enum ResponseContent<'a> {
  /// A completed action
  Success(&'a str),
  /// Neutral information
  Info(&'a str),
  /// Something the user should know about but that didn't stop the command
  Warning(&'a str),
  /// A failed command
  Error(&'a HarvesterdError),
  /// The years an archive provides
  Years(&'a YearIndex),
  /// The live state of a run
  Progress(&'a ProgressSnapshot),
  /// The final tally of a run
  Report(&'a RunReport),
}

/// The ways a command can interact with the user.
pub trait UserInteraction {
  /// Asks a yes/no question.
  fn confirm(&self, message: &str) -> Result<bool>;
  /// Asks for a year, suggesting `default`.
  fn prompt_year(&self, message: &str, default: u16) -> Result<u16>;
  /// Shows `content`.
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

/// [`UserInteraction`] on the process's terminal.
#[derive(Debug)]
pub struct Terminal {
  /// Answer every prompt with its default
  accept_defaults: bool,
  /// Destination of the live progress line
  progress_line:   Term,
}

impl Terminal {
  /// Creates a terminal interaction, optionally answering every prompt with its default.
  pub fn new(accept_defaults: bool) -> Self {
    Self { accept_defaults, progress_line: Term::stderr() }
  }
}

impl UserInteraction for Terminal {
  fn confirm(&self, message: &str) -> Result<bool> {
    if self.accept_defaults {
      return Ok(true);
    }
    Ok(Confirm::new().with_prompt(message).default(false).interact()?)
  }

  fn prompt_year(&self, message: &str, default: u16) -> Result<u16> {
    if self.accept_defaults {
      return Ok(default);
    }
    Ok(Input::<u16>::new().with_prompt(message).default(default).interact_text()?)
  }

  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Success(message) => println!("{} {message}", style(SUCCESS_PREFIX).green()),
      ResponseContent::Info(message) => println!("{} {message}", style(INFO_PREFIX).blue()),
      ResponseContent::Warning(message) =>
        println!("{} {}", style(WARNING_PREFIX).yellow(), style(message).yellow()),
      ResponseContent::Error(error) =>
        eprintln!("{} {}", style(ERROR_PREFIX).red(), style(error).red()),
      ResponseContent::Years(index) => {
        let Some((min, max)) = index.bounds() else {
          println!("{} No years found", style(WARNING_PREFIX).yellow());
          return Ok(());
        };
        println!(
          "{} {} years available ({}-{})",
          style(INFO_PREFIX).blue(),
          style(index.len()).cyan(),
          style(min).yellow(),
          style(max).yellow()
        );
        let years = index.years();
        for (i, year) in years.iter().enumerate() {
          let prefix = if i + 1 == years.len() { LAST_ITEM_PREFIX } else { ITEM_PREFIX };
          println!("   {} {}", style(prefix).dim(), year);
        }
      },
      ResponseContent::Progress(snapshot) => {
        // Only redraw on an interactive terminal; redirected output gets the final tally only
        if self.progress_line.is_term() {
          self.progress_line.clear_line()?;
          self.progress_line.write_str(&format!(
            "{} {:>6.2}%  {} downloaded  {} failed  {} total",
            style(WORKING_PREFIX).cyan(),
            snapshot.percent(),
            style(snapshot.downloaded_papers).green(),
            style(snapshot.failed_papers).red(),
            snapshot.total_papers
          ))?;
        }
      },
      ResponseContent::Report(report) => {
        if self.progress_line.is_term() {
          self.progress_line.clear_line()?;
        }
        let progress = &report.progress;
        if report.stopped {
          println!(
            "{} Stopped with {} papers never attempted",
            style(WARNING_PREFIX).yellow(),
            style(report.pending()).yellow()
          );
        }
        println!(
          "{} Downloaded {} of {} papers ({} failed)",
          style(SUCCESS_PREFIX).green(),
          style(progress.downloaded_papers).green(),
          style(progress.total_papers).cyan(),
          style(progress.failed_papers).red()
        );
        let years: Vec<_> = progress.per_year.iter().collect();
        for (i, (year, counts)) in years.iter().enumerate() {
          let prefix = if i + 1 == years.len() { LAST_ITEM_PREFIX } else { ITEM_PREFIX };
          println!(
            "   {} {}: {}/{} ({:.2}%), {} failed",
            style(prefix).dim(),
            style(year).yellow(),
            counts.downloaded,
            counts.total,
            counts.percent(),
            counts.failed
          );
        }
        for failure in &report.failures {
          if let Outcome::Failed { reason } = &failure.outcome {
            println!(
              "{} {} ({}): {}",
              style(ERROR_PREFIX).red(),
              failure.title,
              failure.year,
              style(reason).dim()
            );
          }
        }
      },
    }
    Ok(())
  }
}
