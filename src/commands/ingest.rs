use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::authorize;
use crate::config::{RemoteConfig, Settings};
use crate::intake::{Photo, RecordIntake};

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("heic") => "image/heic",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

pub async fn ingest_command(settings: &Settings, data: &Path, photos: &[PathBuf]) -> Result<()> {
    let json = fs::read_to_string(data)
        .with_context(|| format!("Failed to read submission {:?}", data))?;

    let mut blobs = Vec::with_capacity(photos.len());
    for path in photos {
        let bytes = fs::read(path).with_context(|| format!("Failed to read photo {:?}", path))?;
        debug!("Photo {:?}: {} bytes", path, bytes.len());
        blobs.push(Photo::new(bytes, mime_for(path)));
    }

    let remote = RemoteConfig::from_env().context("Failed to read remote configuration")?;
    let clients = authorize(&remote).await.context("Authorization failed")?;

    let submission = RecordIntake::new(
        clients.rows.as_ref(),
        clients.objects.as_ref(),
        remote.photo_folder_id.clone(),
    )
    .with_labels(settings.status_labels())
    .submit(&json, blobs)
    .await
    .context("Failed to store submission")?;

    println!(
        "Stored well '{}' as row {} with {} photos.",
        submission.record_id,
        submission.row,
        submission.photo_ids.len()
    );
    Ok(())
}
