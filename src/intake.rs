//! Turns a mobile submission into a pending row plus stored photos.

use log::{debug, info};
use serde_json::Value;

use crate::api::models::{RowId, RowStatus, StatusLabels};
use crate::api::store::{ObjectStore, RowStore};
use crate::error::{Error, Result};
use crate::report::record::{CONNECTIONS_FIELD, value_text};

/// Record id used for photo names when the submission carries no well number.
pub const UNKNOWN_ID: &str = "SIN_ID";

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Photo {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub record_id: String,
    pub row: RowId,
    pub photo_ids: Vec<String>,
}

/// Look a column up as a top-level key, then as `section.rest` for a
/// `section_rest` column name.
fn lookup<'a>(data: &'a Value, column: &str) -> Option<&'a Value> {
    if let Some(value) = data.get(column) {
        return Some(value);
    }
    let (section, rest) = column.split_once('_')?;
    data.get(section)?.get(rest)
}

/// Lay a submission out along the row store's columns.
pub fn flatten(data: &Value, header: &[String], labels: &StatusLabels) -> Vec<String> {
    header
        .iter()
        .map(|column| {
            if *column == labels.column {
                return labels.label(&RowStatus::Pending).to_string();
            }
            if column == CONNECTIONS_FIELD {
                return match data.get(CONNECTIONS_FIELD) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => "[]".to_string(),
                    Some(other) => other.to_string(),
                };
            }
            lookup(data, column).and_then(value_text).unwrap_or_default()
        })
        .collect()
}

/// Highest `n` among names shaped `{prefix}{n}`.
fn last_sequence<'a>(names: impl Iterator<Item = &'a str>, prefix: &str) -> u32 {
    names
        .filter_map(|name| name.strip_prefix(prefix))
        .filter_map(|rest| rest.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

pub struct RecordIntake<'a> {
    rows: &'a dyn RowStore,
    objects: &'a dyn ObjectStore,
    photo_folder: Option<String>,
    labels: StatusLabels,
}

impl<'a> RecordIntake<'a> {
    pub fn new(rows: &'a dyn RowStore, objects: &'a dyn ObjectStore, photo_folder: Option<String>) -> Self {
        Self {
            rows,
            objects,
            photo_folder,
            labels: StatusLabels::default(),
        }
    }

    pub fn with_labels(mut self, labels: StatusLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Store one submission: append its row as pending, then upload photos
    /// named `{record_id}-{n}`, continuing any existing sequence.
    pub async fn submit(&self, json: &str, photos: Vec<Photo>) -> Result<Submission> {
        let data: Value = serde_json::from_str(json).map_err(|e| Error::malformed("submission", e))?;
        if !data.is_object() {
            return Err(Error::malformed("submission", "expected a JSON object"));
        }

        let folder = match (photos.is_empty(), &self.photo_folder) {
            (true, _) => None,
            (false, Some(folder)) => Some(folder.as_str()),
            (false, None) => {
                return Err(Error::Config("photos submitted but no photo folder is configured".to_string()));
            }
        };

        let record_id = data
            .get("pozo_numero")
            .and_then(value_text)
            .unwrap_or_else(|| UNKNOWN_ID.to_string());

        let header = self.rows.header().await?;
        if header.is_empty() {
            return Err(Error::remote("append row", "row store has no header row"));
        }
        let row = self.rows.append_row(flatten(&data, &header, &self.labels)).await?;
        info!("Stored submission for well '{}' as row {}", record_id, row);

        let mut photo_ids = Vec::with_capacity(photos.len());
        if let Some(folder) = folder {
            let prefix = format!("{}-", record_id);
            let existing = self.objects.find_by_name_prefix(&prefix, folder).await?;
            let mut sequence = last_sequence(existing.iter().map(|o| o.name.as_str()), &prefix);
            debug!("Well '{}' already has photos up to #{}", record_id, sequence);

            for photo in photos {
                sequence += 1;
                let name = format!("{}{}", prefix, sequence);
                let id = self.objects.upload(photo.bytes, &name, &photo.mime, folder).await?;
                photo_ids.push(id);
            }
            info!("Uploaded {} photos for well '{}'", photo_ids.len(), record_id);
        }

        Ok(Submission {
            record_id,
            row,
            photo_ids,
        })
    }
}
