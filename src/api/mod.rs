//! Remote collaborators: the row store (Google Sheets) and the object store
//! (Google Drive), plus authentication and retry.

pub mod auth;
pub mod client;
pub mod constants;
pub mod drive;
pub mod manager;
pub mod models;
pub mod resilience;
pub mod sheets;
pub mod store;

pub use auth::Credentials;
pub use client::GoogleClient;
pub use manager::{AuthorizedClients, authorize};
pub use models::{ObjectRef, Row, RowId, RowStatus, StatusLabels};
pub use resilience::{RetryConfig, RetryPolicy};
pub use store::{ObjectStore, RowStore};
