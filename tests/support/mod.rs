//! In-memory row store and object store used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use survey_reports::api::{ObjectRef, ObjectStore, Row, RowId, RowStore};
use survey_reports::error::{Error, Result};
use survey_reports::report::{CellRef, Record, Workbook, Worksheet};

pub const TEMPLATE_ID: &str = "template";
pub const REPORT_ID: &str = "report";

pub struct MemoryRowStore {
    header: Vec<String>,
    rows: Mutex<Vec<Vec<String>>>,
    failing_rows: HashSet<u32>,
    pub updates: AtomicUsize,
}

impl MemoryRowStore {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Mutex::new(Vec::new()),
            failing_rows: HashSet::new(),
            updates: AtomicUsize::new(0),
        }
    }

    /// Survey layout used by most tests: id, address, connections, status.
    pub fn survey() -> Self {
        Self::new(&["pozo_numero", "direccion", "conexiones", "Estado"])
    }

    pub fn with_row(self, values: &[&str]) -> Self {
        self.rows
            .lock()
            .unwrap()
            .push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Make status updates for this spreadsheet row number fail.
    pub fn failing_updates_for(mut self, row: u32) -> Self {
        self.failing_rows.insert(row);
        self
    }

    pub fn cell(&self, row: u32, column: &str) -> Option<String> {
        let col = self.header.iter().position(|h| h == column)?;
        let rows = self.rows.lock().unwrap();
        rows.get(row as usize - 2).and_then(|r| r.get(col)).cloned()
    }

    pub fn statuses(&self) -> Vec<String> {
        let rows = self.rows.lock().unwrap().len() as u32;
        (2..rows + 2)
            .map(|r| self.cell(r, "Estado").unwrap_or_default())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn header(&self) -> Result<Vec<String>> {
        Ok(self.header.clone())
    }

    async fn list_rows(&self) -> Result<Vec<Row>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, values)| {
                let fields: HashMap<String, Value> = self
                    .header
                    .iter()
                    .enumerate()
                    .map(|(c, h)| (h.clone(), Value::String(values.get(c).cloned().unwrap_or_default())))
                    .collect();
                Row {
                    id: RowId(i as u32 + 2),
                    record: Record::from_fields(fields),
                }
            })
            .collect())
    }

    async fn update_cell(&self, row: RowId, column: &str, value: &str) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.failing_rows.contains(&row.0) {
            return Err(Error::remote("update cell", "HTTP 503: backend unavailable"));
        }
        let col = self
            .header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| Error::remote("update cell", format!("column '{}' not found", column)))?;
        let mut rows = self.rows.lock().unwrap();
        let line = rows
            .get_mut(row.0 as usize - 2)
            .ok_or_else(|| Error::remote("update cell", format!("no row {}", row)))?;
        if line.len() <= col {
            line.resize(col + 1, String::new());
        }
        line[col] = value.to_string();
        Ok(())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<RowId> {
        let mut rows = self.rows.lock().unwrap();
        rows.push(values);
        Ok(RowId(rows.len() as u32 + 1))
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (String, String, Vec<u8>)>>,
    next_id: AtomicUsize,
    fail_replace: bool,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub replaces: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, id: &str, name: &str, folder: &str, bytes: Vec<u8>) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), folder.to_string(), bytes));
        self
    }

    /// Template and a freshly created, still empty report object.
    pub fn with_report_objects(self, template: Vec<u8>) -> Self {
        self.with_object(TEMPLATE_ID, "plantilla.xlsx", "reports", template)
            .with_object(REPORT_ID, "reporte.xlsx", "reports", Vec::new())
    }

    pub fn failing_replace(mut self) -> Self {
        self.fail_replace = true;
        self
    }

    pub fn bytes(&self, id: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(id).map(|(_, _, b)| b.clone())
    }

    pub fn names_in(&self, folder: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|(_, f, _)| f == folder)
            .map(|(n, _, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    pub fn io_calls(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
            + self.uploads.load(Ordering::SeqCst)
            + self.replaces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str, _mime: &str, folder: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let id = format!("obj-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.objects
            .lock()
            .unwrap()
            .insert(id.clone(), (name.to_string(), folder.to_string(), bytes));
        Ok(id)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.bytes(id)
            .ok_or_else(|| Error::remote("download object", format!("HTTP 404: {} not found", id)))
    }

    async fn replace(&self, id: &str, bytes: Vec<u8>, _mime: &str) -> Result<()> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        if self.fail_replace {
            return Err(Error::remote("replace object", "HTTP 500: internal error"));
        }
        let mut objects = self.objects.lock().unwrap();
        let entry = objects
            .get_mut(id)
            .ok_or_else(|| Error::remote("replace object", format!("HTTP 404: {} not found", id)))?;
        entry.2 = bytes;
        Ok(())
    }

    async fn find_by_name_prefix(&self, prefix: &str, folder: &str) -> Result<Vec<ObjectRef>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (name, f, _))| f == folder && name.starts_with(prefix))
            .map(|(id, (name, _, _))| ObjectRef {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }
}

/// A one-sheet template with a title cell and a merged header.
pub fn template_bytes() -> Vec<u8> {
    let mut sheet = Worksheet::new("Plantilla");
    sheet.write(CellRef::new(0, 0), "FORMATO DE INSPECCION DE POZOS");
    sheet.merge(CellRef::new(0, 0), CellRef::new(0, 7));
    sheet.write(CellRef::new(2, 1), "Fecha:");
    let mut workbook = Workbook::new();
    workbook.push(sheet);
    workbook.to_xlsx_bytes().unwrap()
}
