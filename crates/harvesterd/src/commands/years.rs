//! Module for listing the years an archive provides.

use super::*;

/// Function for the [`Commands::Years`] in the CLI.
pub async fn years<I: UserInteraction>(cli: &Cli, interaction: &I) -> Result<()> {
  let harvester = Harvester::new(cli.load_config()?)?;
  harvester.preflight().await?;

  let index = harvester.archive().year_index().await;
  interaction.reply(ResponseContent::Years(&index))
}
