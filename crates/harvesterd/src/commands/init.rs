//! Module for writing a starter configuration file.

use super::*;

/// Function for the [`Commands::Init`] in the CLI.
pub fn init<I: UserInteraction>(cli: &Cli, interaction: &I) -> Result<()> {
  let path = cli.config_path();

  if path.exists()
    && !interaction
      .confirm(&format!("A configuration already exists at {path:?}, do you want to overwrite it?"))?
  {
    interaction.reply(ResponseContent::Info(
      "Keeping the existing configuration. Pass a different location with --config",
    ))?;
    return Ok(());
  }

  let mut config = Config::default();
  if let Some(base_url) = &cli.base_url {
    config = config.with_base_url(base_url);
    config.validate()?;
  }
  config.save(&path)?;

  interaction.reply(ResponseContent::Success(&format!(
    "Created configuration with\nConfig path: {path:?}\nArchive: {}\nDownload directory: {:?}\nMetadata \
     file: {:?}",
    config.base_url, config.download_dir, config.metadata_path,
  )))?;
  Ok(())
}
