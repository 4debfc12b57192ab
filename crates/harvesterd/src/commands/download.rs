//! Module for downloading the papers of a range of years.

use harvester::fetch::RetryPolicy;

use super::*;

/// Options of the [`Commands::Download`] command. Each one overrides the configuration file.
#[derive(Args, Clone, Debug, Default)]
pub struct DownloadOptions {
  /// First year to download; prompted for if missing
  #[arg(long)]
  pub start:       Option<u16>,
  /// Last year to download; prompted for if missing
  #[arg(long)]
  pub end:         Option<u16>,
  /// Directory receiving the PDFs
  #[arg(long, short)]
  pub output:      Option<PathBuf>,
  /// File receiving the metadata records
  #[arg(long)]
  pub metadata:    Option<PathBuf>,
  /// Layout of the metadata file (csv or jsonl)
  #[arg(long, value_parser = parse_format)]
  pub format:      Option<MetadataFormat>,
  /// Number of papers downloaded at the same time
  #[arg(long)]
  pub concurrency: Option<usize>,
  /// Attempts per request, the first one included (1 disables retries)
  #[arg(long)]
  pub retries:     Option<usize>,
  /// Also fetch each paper's detail page and record its abstract
  #[arg(long)]
  pub abstracts:   bool,
}

impl DownloadOptions {
  /// Applies these options on top of `config`.
  pub fn apply(&self, mut config: Config) -> Result<Config> {
    if let Some(output) = &self.output {
      config = config.with_download_dir(output);
    }
    if let Some(metadata) = &self.metadata {
      config = config.with_metadata_path(metadata);
    }
    if let Some(format) = self.format {
      config = config.with_metadata_format(format);
    }
    if let Some(concurrency) = self.concurrency {
      config = config.with_concurrency(concurrency);
    }
    if let Some(attempts) = self.retries {
      let backoff = config.retry.backoff_secs.clone();
      config = config.with_retry(RetryPolicy::new(attempts, backoff));
    }
    if self.abstracts {
      config = config.with_abstracts(true);
    }
    config.validate()?;
    Ok(config)
  }
}

/// Parses the `--format` value.
fn parse_format(value: &str) -> std::result::Result<MetadataFormat, String> {
  value.parse().map_err(|e: HarvesterError| e.to_string())
}

/// Function for the [`Commands::Download`] in the CLI.
pub async fn download<I: UserInteraction>(
  cli: &Cli,
  options: &DownloadOptions,
  interaction: &I,
) -> Result<()> {
  let config = options.apply(cli.load_config()?)?;
  let harvester = Harvester::new(config)?;

  interaction
    .reply(ResponseContent::Info(&format!("Connecting to {}", harvester.archive().base_url())))?;
  harvester.preflight().await?;

  let (min, max) = harvester.archive().year_bounds().await?;
  let start = match options.start {
    Some(start) => start,
    None => interaction.prompt_year(&format!("First year ({min}-{max})"), min)?,
  };
  let end = match options.end {
    Some(end) => end,
    None => interaction.prompt_year(&format!("Last year ({start}-{max})"), max)?,
  };
  let range = YearRange::new(start, end);
  range.validate((min, max))?;

  interaction.reply(ResponseContent::Info(&format!(
    "Downloading {range} into {:?} with {} concurrent downloads",
    harvester.config().download_dir,
    harvester.config().concurrency
  )))?;

  let stop = harvester.stop_handle();
  let mut feed = harvester.progress().subscribe();
  let mut feed_open = true;
  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);
  let run = harvester.run(range);
  tokio::pin!(run);

  let report = loop {
    tokio::select! {
      report = &mut run => break report?,
      changed = feed.changed(), if feed_open => match changed {
        Ok(()) => {
          let snapshot = feed.borrow_and_update().clone();
          interaction.reply(ResponseContent::Progress(&snapshot))?;
        },
        Err(_) => feed_open = false,
      },
      signal = &mut ctrl_c, if !stop.is_stopped() => {
        signal?;
        stop.stop();
        interaction.reply(ResponseContent::Warning(
          "Stopping: papers already downloading will finish, no new ones will start",
        ))?;
      },
    }
  };

  interaction.reply(ResponseContent::Report(&report))?;
  interaction.reply(ResponseContent::Info(&format!(
    "Metadata recorded in {:?}",
    harvester.config().metadata_path
  )))?;
  Ok(())
}
