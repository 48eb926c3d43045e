//! Row store backed by one worksheet of a Google spreadsheet.

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

use super::client::GoogleClient;
use super::constants::{append_endpoint, quoted_sheet, values_endpoint};
use super::models::{Row, RowId};
use super::store::RowStore;
use crate::error::{Error, Result};
use crate::report::cell::{CellRef, column_letters};
use crate::report::record::Record;

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

pub struct SheetsRowStore {
    client: GoogleClient,
    spreadsheet_id: String,
    sheet: String,
}

impl SheetsRowStore {
    pub fn new(client: GoogleClient, spreadsheet_id: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            sheet: sheet.into(),
        }
    }

    async fn read_range(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = values_endpoint(&self.spreadsheet_id, range);
        let body = self
            .client
            .send_json("read rows", |http| http.get(&url))
            .await?;
        let parsed: ValueRange =
            serde_json::from_value(body).map_err(|e| Error::remote("read rows", e))?;
        Ok(parsed.values)
    }
}

/// Turn a values grid (header first) into rows keyed by column name.
fn rows_from_grid(grid: Vec<Vec<Value>>) -> Vec<Row> {
    let mut lines = grid.into_iter();
    let header: Vec<String> = match lines.next() {
        Some(header) => header.iter().map(cell_string).collect(),
        None => return Vec::new(),
    };

    lines
        .enumerate()
        .map(|(index, line)| {
            let mut fields = HashMap::with_capacity(header.len());
            for (col, name) in header.iter().enumerate() {
                if name.is_empty() {
                    continue;
                }
                let value = line.get(col).map(cell_string).unwrap_or_default();
                fields.insert(name.clone(), Value::String(value));
            }
            Row {
                id: RowId(index as u32 + 2),
                record: Record::from_fields(fields),
            }
        })
        .collect()
}

fn cell_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row number of the first cell of an A1 range such as `'Hoja'!A7:Z7`.
fn first_row_of_range(range: &str) -> Option<u32> {
    let cells = range.rsplit('!').next()?;
    let first = cells.split(':').next()?.replace('$', "");
    CellRef::parse(&first).ok().map(|cell| cell.row + 1)
}

#[async_trait]
impl RowStore for SheetsRowStore {
    async fn header(&self) -> Result<Vec<String>> {
        let range = format!("{}!1:1", quoted_sheet(&self.sheet));
        let grid = self.read_range(&range).await?;
        Ok(grid
            .into_iter()
            .next()
            .map(|header| header.iter().map(cell_string).collect())
            .unwrap_or_default())
    }

    async fn list_rows(&self) -> Result<Vec<Row>> {
        let grid = self.read_range(&quoted_sheet(&self.sheet)).await?;
        let rows = rows_from_grid(grid);
        info!("Read {} rows from '{}'", rows.len(), self.sheet);
        Ok(rows)
    }

    async fn update_cell(&self, row: RowId, column: &str, value: &str) -> Result<()> {
        let header = self.header().await?;
        let index = header
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| Error::remote("update cell", format!("column '{}' not found", column)))?;

        let range = format!("{}!{}{}", quoted_sheet(&self.sheet), column_letters(index as u16), row);
        let url = values_endpoint(&self.spreadsheet_id, &range);
        let body = json!({ "values": [[value]] });

        self.client
            .send("update cell", |http| {
                http.put(&url)
                    .query(&[("valueInputOption", "RAW")])
                    .json(&body)
            })
            .await?;
        debug!("Set {} of row {} to '{}'", column, row, value);
        Ok(())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<RowId> {
        let url = append_endpoint(&self.spreadsheet_id, &quoted_sheet(&self.sheet));
        let body = json!({ "values": [values] });

        let response = self
            .client
            .send_json("append row", |http| {
                http.post(&url)
                    .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                    .json(&body)
            })
            .await?;

        let parsed: AppendResponse =
            serde_json::from_value(response).map_err(|e| Error::remote("append row", e))?;
        let row = first_row_of_range(&parsed.updates.updated_range).ok_or_else(|| {
            Error::remote(
                "append row",
                format!("unexpected range '{}'", parsed.updates.updated_range),
            )
        })?;
        Ok(RowId(row))
    }
}
