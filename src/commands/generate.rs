use anyhow::{Context, Result};
use log::info;

use super::build_filler;
use crate::api::authorize;
use crate::config::{RemoteConfig, Settings};
use crate::report::lifecycle::{ReportRunner, RunSummary};

/// Run one generation pass over the row store.
pub async fn generate_command(settings: &Settings) -> Result<RunSummary> {
    let remote = RemoteConfig::from_env().context("Failed to read remote configuration")?;
    let targets = remote.report_targets()?;
    let clients = authorize(&remote).await.context("Authorization failed")?;
    let filler = build_filler(settings);

    let summary = ReportRunner::new(clients.rows.as_ref(), clients.objects.as_ref(), &filler, targets)
        .with_labels(settings.status_labels())
        .with_identifier_field(settings.identifier_field.clone())
        .run()
        .await
        .context("Report generation failed")?;

    info!(
        "Generation finished: {} processed, {} skipped, {} uncommitted",
        summary.processed,
        summary.skipped,
        summary.uncommitted.len()
    );
    println!(
        "Processed {} rows ({} not pending).",
        summary.processed, summary.skipped
    );
    if !summary.uncommitted.is_empty() {
        let rows: Vec<String> = summary.uncommitted.iter().map(|r| r.to_string()).collect();
        println!(
            "Status update failed for rows {}; they will be rendered again next run.",
            rows.join(", ")
        );
    }
    Ok(summary)
}
