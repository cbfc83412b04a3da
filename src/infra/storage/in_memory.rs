// IN-MEMORY implementation of StorageClient.
//
// Pipeline tests run against this instead of Google Drive. Folders are plain
// vectors keyed by folder id, so after a cycle a test can look at exactly
// which folder every file ended up in. Listing and move failures can be
// injected per folder / per file.

use crate::core::storage::{DriveFile, MimeFilter, StorageClient, StorageError};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

#[derive(Clone, Debug)]
struct StoredFile {
    file: DriveFile,
    content: Vec<u8>,
}

pub struct InMemoryDrive {
    /// Maps folder id -> files currently in that folder.
    folders: DashMap<String, Vec<StoredFile>>,
    failing_listings: DashSet<String>,
    failing_downloads: DashSet<String>,
    failing_moves: DashSet<String>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        Self {
            folders: DashMap::new(),
            failing_listings: DashSet::new(),
            failing_downloads: DashSet::new(),
            failing_moves: DashSet::new(),
        }
    }

    pub fn add_file(&self, folder_id: &str, file_id: &str, name: &str, mime_type: &str, content: &[u8]) {
        self.folders
            .entry(folder_id.to_string())
            .or_default()
            .push(StoredFile {
                file: DriveFile {
                    id: file_id.to_string(),
                    name: name.to_string(),
                    mime_type: mime_type.to_string(),
                },
                content: content.to_vec(),
            });
    }

    pub fn fail_listing(&self, folder_id: &str) {
        self.failing_listings.insert(folder_id.to_string());
    }

    pub fn fail_download(&self, file_id: &str) {
        self.failing_downloads.insert(file_id.to_string());
    }

    pub fn fail_moves(&self, file_id: &str) {
        self.failing_moves.insert(file_id.to_string());
    }

    /// Names of the files currently in a folder, in insertion order.
    pub fn file_names(&self, folder_id: &str) -> Vec<String> {
        self.folders
            .get(folder_id)
            .map(|files| files.iter().map(|f| f.file.name.clone()).collect())
            .unwrap_or_default()
    }
}

/// Same selection the Drive `q` clause makes server-side.
fn mime_matches(filter: MimeFilter, mime_type: &str) -> bool {
    match filter {
        MimeFilter::Images => mime_type.contains("image/"),
        MimeFilter::PlainText => mime_type == "text/plain",
    }
}

#[async_trait]
impl StorageClient for InMemoryDrive {
    async fn list_files(
        &self,
        folder_id: &str,
        filter: MimeFilter,
    ) -> Result<Vec<DriveFile>, StorageError> {
        if self.failing_listings.contains(folder_id) {
            return Err(StorageError::Request(format!(
                "connection reset while listing {}",
                folder_id
            )));
        }

        Ok(self
            .folders
            .get(folder_id)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| mime_matches(filter, &f.file.mime_type))
                    .map(|f| f.file.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        if self.failing_downloads.contains(file_id) {
            return Err(StorageError::Api {
                status: 500,
                message: "download failed".to_string(),
            });
        }

        self.folders
            .iter()
            .find_map(|entry| {
                entry
                    .value()
                    .iter()
                    .find(|f| f.file.id == file_id)
                    .map(|f| f.content.clone())
            })
            .ok_or_else(|| StorageError::Api {
                status: 404,
                message: format!("File not found: {}", file_id),
            })
    }

    async fn move_file(
        &self,
        file_id: &str,
        destination_folder_id: &str,
    ) -> Result<(), StorageError> {
        if self.failing_moves.contains(file_id) {
            return Err(StorageError::Api {
                status: 403,
                message: "insufficient permissions".to_string(),
            });
        }

        // Take the file out first; the iterator guard must be dropped before
        // touching the destination entry or DashMap would deadlock.
        let mut moved = None;
        for mut entry in self.folders.iter_mut() {
            if let Some(pos) = entry.value().iter().position(|f| f.file.id == file_id) {
                moved = Some(entry.value_mut().remove(pos));
                break;
            }
        }

        let stored = moved.ok_or_else(|| StorageError::Api {
            status: 404,
            message: format!("File not found: {}", file_id),
        })?;

        self.folders
            .entry(destination_folder_id.to_string())
            .or_default()
            .push(stored);

        Ok(())
    }
}
