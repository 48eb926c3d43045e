use anyhow::{Context, Result};

use super::generate_command;
use crate::api::authorize;
use crate::config::{RemoteConfig, Settings};
use crate::reset::reset_record;

pub async fn reset_command(settings: &Settings, identifier: &str, then_generate: bool) -> Result<()> {
    let remote = RemoteConfig::from_env().context("Failed to read remote configuration")?;
    let clients = authorize(&remote).await.context("Authorization failed")?;

    let row = reset_record(
        clients.rows.as_ref(),
        &settings.status_labels(),
        &settings.identifier_field,
        identifier,
    )
    .await
    .with_context(|| format!("Failed to reset '{}'", identifier))?;

    match row {
        Some(row) => println!("Row {} ('{}') is pending again.", row, identifier),
        None => anyhow::bail!("No row with {} = '{}'", settings.identifier_field, identifier),
    }

    if then_generate {
        generate_command(settings).await?;
    }
    Ok(())
}
