//! Object store backed by Google Drive.

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use super::client::GoogleClient;
use super::constants::{DRIVE_FILES, DRIVE_UPLOAD, UPLOAD_BOUNDARY, drive_literal, headers};
use super::models::ObjectRef;
use super::store::ObjectStore;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<ObjectRef>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

pub struct DriveObjectStore {
    client: GoogleClient,
}

impl DriveObjectStore {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

/// Body of a `multipart/related` upload: JSON metadata, then the media.
fn multipart_body(metadata: &serde_json::Value, bytes: &[u8], mime: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", headers::CONTENT_TYPE_JSON).as_bytes());
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", UPLOAD_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", UPLOAD_BOUNDARY).as_bytes());
    body
}

fn prefix_query(prefix: &str, folder: &str) -> String {
    format!(
        "name contains '{}' and '{}' in parents and trashed = false",
        drive_literal(prefix),
        drive_literal(folder)
    )
}

#[async_trait]
impl ObjectStore for DriveObjectStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str, mime: &str, folder: &str) -> Result<String> {
        let metadata = json!({ "name": name, "parents": [folder] });
        let body = multipart_body(&metadata, &bytes, mime);
        let content_type = format!("multipart/related; boundary={}", UPLOAD_BOUNDARY);

        let response = self
            .client
            .send_json("upload object", |http| {
                http.post(DRIVE_UPLOAD)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("supportsAllDrives", "true"),
                        ("fields", "id"),
                    ])
                    .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                    .body(body.clone())
            })
            .await?;

        let id = response
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| Error::remote("upload object", "response carries no file id"))?;
        info!("Uploaded '{}' ({} bytes) as {}", name, bytes.len(), id);
        Ok(id.to_string())
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", DRIVE_FILES, id);
        let bytes = self
            .client
            .send("download object", |http| {
                http.get(&url)
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            })
            .await?
            .bytes()
            .await
            .map_err(|e| Error::remote("download object", e))?;
        debug!("Downloaded {} ({} bytes)", id, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn replace(&self, id: &str, bytes: Vec<u8>, mime: &str) -> Result<()> {
        let url = format!("{}/{}", DRIVE_UPLOAD, id);
        self.client
            .send("replace object", |http| {
                http.patch(&url)
                    .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(bytes.clone())
            })
            .await?;
        info!("Replaced content of {} ({} bytes)", id, bytes.len());
        Ok(())
    }

    async fn find_by_name_prefix(&self, prefix: &str, folder: &str) -> Result<Vec<ObjectRef>> {
        let q = prefix_query(prefix, folder);
        let mut found = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = self
                .client
                .send_json("list objects", |http| {
                    let mut request = http.get(DRIVE_FILES).query(&[
                        ("q", q.as_str()),
                        ("fields", "nextPageToken, files(id, name)"),
                        ("supportsAllDrives", "true"),
                        ("includeItemsFromAllDrives", "true"),
                        ("pageSize", "1000"),
                    ]);
                    if let Some(token) = &token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            let page: FileList =
                serde_json::from_value(response).map_err(|e| Error::remote("list objects", e))?;
            // `contains` matches on word prefixes; keep exact name prefixes only.
            found.extend(page.files.into_iter().filter(|f| f.name.starts_with(prefix)));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("{} objects named '{}*' in {}", found.len(), prefix, folder);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(&json!({"name": "W1-1"}), b"PNG", "image/jpeg");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{}\r\n", UPLOAD_BOUNDARY)));
        assert!(text.contains(r#"{"name":"W1-1"}"#));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nPNG\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", UPLOAD_BOUNDARY)));
    }

    #[test]
    fn test_prefix_query_escapes_quotes() {
        assert_eq!(
            prefix_query("P'1-", "folder"),
            "name contains 'P\\'1-' and 'folder' in parents and trashed = false"
        );
    }
}
