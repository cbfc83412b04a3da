// =============================================================================
// GOOGLE DRIVE CLIENT
// =============================================================================
//
// Implements `StorageClient` over the Drive v3 REST API:
//
// - list:     GET   /drive/v3/files?q=...&fields=...&pageToken=...
// - download: GET   /drive/v3/files/{id}?alt=media
// - move:     GET   /drive/v3/files/{id}?fields=parents, then
//             PATCH /drive/v3/files/{id}?addParents=..&removeParents=..
//
// Drive has no "move" call; a move is swapping the file's parents.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::service_account::AccessTokenSource;
use crate::core::storage::{DriveFile, MimeFilter, StorageClient, StorageError};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<ApiFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

impl From<ApiFile> for DriveFile {
    fn from(api: ApiFile) -> Self {
        DriveFile {
            id: api.id,
            name: api.name,
            mime_type: api.mime_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn request_error(e: reqwest::Error) -> StorageError {
    StorageError::Request(e.to_string())
}

/// Escapes a value for use inside a single-quoted Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct DriveClient<T: AccessTokenSource> {
    client: Client,
    auth: T,
    base_url: String,
}

impl<T: AccessTokenSource> DriveClient<T> {
    pub fn new(client: Client, auth: T) -> Self {
        Self {
            client,
            auth,
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.base_url, file_id)
    }

    fn list_query(folder_id: &str, filter: MimeFilter) -> String {
        let mime_clause = match filter {
            MimeFilter::Images => "mimeType contains 'image/'",
            MimeFilter::PlainText => "mimeType = 'text/plain'",
        };
        format!(
            "'{}' in parents and trashed = false and {}",
            escape_query_value(folder_id),
            mime_clause
        )
    }

    async fn bearer(&self) -> Result<String, StorageError> {
        Ok(format!("Bearer {}", self.auth.access_token().await?))
    }

    /// Turns a non-2xx response into `StorageError::Api`, preferring Google's
    /// own error message when the body carries one.
    async fn check(response: Response) -> Result<Response, StorageError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);

        Err(StorageError::Api { status, message })
    }
}

#[async_trait]
impl<T: AccessTokenSource> StorageClient for DriveClient<T> {
    async fn list_files(
        &self,
        folder_id: &str,
        filter: MimeFilter,
    ) -> Result<Vec<DriveFile>, StorageError> {
        let query = Self::list_query(folder_id, filter);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.files_url())
                .header("Authorization", self.bearer().await?)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", LIST_FIELDS),
                    ("pageSize", PAGE_SIZE),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = Self::check(request.send().await.map_err(request_error)?).await?;
            let page: FileList = response.json().await.map_err(request_error)?;
            files.extend(page.files.into_iter().map(DriveFile::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(folder_id, count = files.len(), "Listed Drive folder");
        Ok(files)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .header("Authorization", self.bearer().await?)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(request_error)?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn move_file(
        &self,
        file_id: &str,
        destination_folder_id: &str,
    ) -> Result<(), StorageError> {
        let bearer = self.bearer().await?;

        // Retrieve the existing parents to remove.
        let response = self
            .client
            .get(self.file_url(file_id))
            .header("Authorization", &bearer)
            .query(&[("fields", "parents")])
            .send()
            .await
            .map_err(request_error)?;
        let current: FileParents = Self::check(response)
            .await?
            .json()
            .await
            .map_err(request_error)?;
        let previous_parents = current.parents.join(",");

        let response = self
            .client
            .patch(self.file_url(file_id))
            .header("Authorization", &bearer)
            .query(&[
                ("addParents", destination_folder_id),
                ("removeParents", previous_parents.as_str()),
                ("fields", "id, parents"),
            ])
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(request_error)?;
        Self::check(response).await?;

        Ok(())
    }
}
