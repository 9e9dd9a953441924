//! Remote blob store adapter
//!
//! Keeps a single JSON snapshot document in the user's Google Drive
//! `appDataFolder`, which is private to this application.
//!
//! Every operation may fail (network, expired token, quota). Callers treat
//! failures as "remote absent" rather than as fatal errors.

use crate::error::{ensure_success, AppError, Result};
use crate::models::StoredSnapshot;
use crate::services::settings::SyncSettings;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;

const APP_DATA_FOLDER: &str = "appDataFolder";

/// Handle to the remote snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A remote space holding one opaque snapshot document per user
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Locate the document, `None` if it was never created
    async fn find(&self) -> Result<Option<FileHandle>>;

    /// Read and parse the document behind `handle`
    async fn read(&self, handle: &FileHandle) -> Result<StoredSnapshot>;

    /// Create the document with `snapshot` as its content
    async fn create(&self, snapshot: &StoredSnapshot) -> Result<FileHandle>;

    /// Replace the whole content of the document behind `handle`
    async fn update(&self, handle: &FileHandle, snapshot: &StoredSnapshot) -> Result<FileHandle>;
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileHandle>,
}

/// Google Drive implementation of [`RemoteStore`]
#[derive(Clone)]
pub struct DriveStore {
    client: reqwest::Client,
    access_token: String,
    api_url: String,
    upload_url: String,
    file_name: String,
}

impl DriveStore {
    pub fn new(access_token: impl Into<String>, settings: &SyncSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aquatrack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            api_url: settings.drive_api_url.trim_end_matches('/').to_string(),
            upload_url: settings.drive_upload_url.trim_end_matches('/').to_string(),
            file_name: settings.file_name.clone(),
        })
    }

    /// Drive search query for the snapshot document
    fn search_query(&self) -> String {
        format!("name='{}' and '{}' in parents", self.file_name, APP_DATA_FOLDER)
    }

    fn create_metadata(&self) -> serde_json::Value {
        json!({
            "name": self.file_name,
            "parents": [APP_DATA_FOLDER],
            "mimeType": "application/json",
        })
    }

    /// Metadata and content go up in one multipart request, so the document
    /// never exists without its content
    fn create_request(&self, snapshot: &StoredSnapshot) -> Result<reqwest::RequestBuilder> {
        let metadata = Part::text(serde_json::to_string(&self.create_metadata())?)
            .mime_str("application/json; charset=UTF-8")?;
        let content = Part::text(serde_json::to_string(snapshot)?).mime_str("application/json")?;
        let form = Form::new().part("metadata", metadata).part("file", content);

        Ok(self
            .client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .multipart(form))
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn find(&self) -> Result<Option<FileHandle>> {
        let response = self
            .client
            .get(format!("{}/files", self.api_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", self.search_query().as_str()),
                ("spaces", APP_DATA_FOLDER),
                ("fields", "files(id,name)"),
            ])
            .send()
            .await?;

        let list: FileList = ensure_success(response, "find file", AppError::Remote)
            .await?
            .json()
            .await?;
        let found = list.files.into_iter().next();

        tracing::debug!("Remote snapshot lookup: {:?}", found.as_ref().map(|f| &f.id));

        Ok(found)
    }

    async fn read(&self, handle: &FileHandle) -> Result<StoredSnapshot> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.api_url, handle.id))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let text = ensure_success(response, "read file", AppError::Remote)
            .await?
            .text()
            .await?;
        let snapshot = serde_json::from_str(&text)?;

        Ok(snapshot)
    }

    async fn create(&self, snapshot: &StoredSnapshot) -> Result<FileHandle> {
        let response = self.create_request(snapshot)?.send().await?;

        let handle: FileHandle = ensure_success(response, "create file", AppError::Remote)
            .await?
            .json()
            .await?;
        tracing::info!("Created remote snapshot file {}", handle.id);

        Ok(handle)
    }

    async fn update(&self, handle: &FileHandle, snapshot: &StoredSnapshot) -> Result<FileHandle> {
        let response = self
            .client
            .patch(format!("{}/files/{}", self.upload_url, handle.id))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media")])
            .json(snapshot)
            .send()
            .await?;

        let updated: FileHandle = ensure_success(response, "update file", AppError::Remote)
            .await?
            .json()
            .await?;
        tracing::debug!("Uploaded remote snapshot to {}", updated.id);

        Ok(updated)
    }
}
