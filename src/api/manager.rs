use log::info;
use std::sync::Arc;

use super::client::GoogleClient;
use super::drive::DriveObjectStore;
use super::resilience::RetryPolicy;
use super::sheets::SheetsRowStore;
use super::store::{ObjectStore, RowStore};
use crate::config::RemoteConfig;
use crate::error::Result;

/// The two collaborators a run needs, authorized once at start.
#[derive(Clone)]
pub struct AuthorizedClients {
    pub rows: Arc<dyn RowStore>,
    pub objects: Arc<dyn ObjectStore>,
}

/// Authenticate and build the row store and object store clients.
/// Failures are fatal: nothing is processed without valid credentials.
pub async fn authorize(config: &RemoteConfig) -> Result<AuthorizedClients> {
    let http = GoogleClient::build_http()?;
    let token = config.credentials.authenticate(&http).await?;
    info!("Authorized against Google APIs");

    let client = GoogleClient::new(http, token.access_token, RetryPolicy::default());
    Ok(AuthorizedClients {
        rows: Arc::new(SheetsRowStore::new(
            client.clone(),
            config.sheet_id.clone(),
            config.sheet_name.clone(),
        )),
        objects: Arc::new(DriveObjectStore::new(client)),
    })
}
