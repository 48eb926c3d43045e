//! Seams to the row store and the object store.
//!
//! The pipeline only ever talks to these traits; the Google-backed
//! implementations live in [`super::sheets`] and [`super::drive`].

use async_trait::async_trait;

use super::models::{ObjectRef, Row, RowId};
use crate::error::Result;

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Column names, in column order.
    async fn header(&self) -> Result<Vec<String>>;

    /// Every data row, in store order.
    async fn list_rows(&self) -> Result<Vec<Row>>;

    async fn update_cell(&self, row: RowId, column: &str, value: &str) -> Result<()>;

    /// Append one row whose cells follow [`RowStore::header`] order.
    async fn append_row(&self, values: Vec<String>) -> Result<RowId>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a new object and return its id.
    async fn upload(&self, bytes: Vec<u8>, name: &str, mime: &str, folder: &str) -> Result<String>;

    async fn download(&self, id: &str) -> Result<Vec<u8>>;

    /// Overwrite the content of an existing object, keeping its id.
    async fn replace(&self, id: &str, bytes: Vec<u8>, mime: &str) -> Result<()>;

    async fn find_by_name_prefix(&self, prefix: &str, folder: &str) -> Result<Vec<ObjectRef>>;
}
