//! Forces a generated row back to pending so the next run renders it again.

use log::{info, warn};

use crate::api::models::{RowId, RowStatus, StatusLabels};
use crate::api::store::RowStore;
use crate::error::Result;

/// Reset the first row whose `identifier_field` equals `identifier`.
/// Returns the row that was reset, or `None` when no row matched.
pub async fn reset_record(
    store: &dyn RowStore,
    labels: &StatusLabels,
    identifier_field: &str,
    identifier: &str,
) -> Result<Option<RowId>> {
    let rows = store.list_rows().await?;
    let Some(row) = rows
        .iter()
        .find(|row| row.record.text(identifier_field).as_deref() == Some(identifier))
    else {
        warn!("No row with {} = '{}'", identifier_field, identifier);
        return Ok(None);
    };

    store
        .update_cell(row.id, &labels.column, labels.label(&RowStatus::Pending))
        .await?;
    info!("Row {} ('{}') reset to '{}'", row.id, identifier, labels.pending);
    Ok(Some(row.id))
}
