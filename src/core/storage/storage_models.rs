// Storage domain: which folders we watch, what a discovered file looks like,
// and the minimal operations the pipeline needs from a cloud drive.
// Nothing here knows about HTTP or Google; `infra/google` fills that in.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// Logical tag of a watched source folder.
///
/// The tag decides which captions get generated: a single-platform folder
/// produces one caption, `All` fans out to every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Linkedin,
    Meta,
    Gbp,
    All,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Linkedin => "linkedin",
            SourceTag::Meta => "meta",
            SourceTag::Gbp => "gbp",
            SourceTag::All => "all",
        }
    }

    /// Platforms a file from this folder gets captions for, in generation order.
    pub fn platforms(self) -> &'static [Platform] {
        match self {
            SourceTag::Linkedin => &[Platform::Linkedin],
            SourceTag::Meta => &[Platform::Meta],
            SourceTag::Gbp => &[Platform::Gbp],
            SourceTag::All => &Platform::ALL,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caption target. Each platform has its own prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Meta,
    Gbp,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Linkedin, Platform::Meta, Platform::Gbp];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Meta => "meta",
            Platform::Gbp => "gbp",
        }
    }

    /// Name of the prompt override file in the configuration folder.
    pub fn prompt_file_name(self) -> String {
        format!("prompt_{}.txt", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watched folder: opaque drive id plus its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub id: String,
    pub tag: SourceTag,
}

/// Every folder the engine touches. Built once from config, never mutated.
#[derive(Debug, Clone)]
pub struct FolderLayout {
    pub sources: Vec<SourceFolder>,
    /// Folder holding `prompt_<platform>.txt` overrides.
    pub prompt_folder: Option<String>,
    pub processed: String,
    pub errors: String,
}

/// A file discovered in a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// Which files a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeFilter {
    /// Anything whose MIME type contains `image/`.
    Images,
    /// Exactly `text/plain`.
    PlainText,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Storage request failed: {0}")]
    Request(String),
    #[error("Storage API error ({status}): {message}")]
    Api { status: u16, message: String },
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Operations the pipeline needs from the drive. Implemented over HTTP by
/// `infra::google::DriveClient` and in memory for tests.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Lists non-trashed files directly inside `folder_id` matching `filter`.
    async fn list_files(
        &self,
        folder_id: &str,
        filter: MimeFilter,
    ) -> Result<Vec<DriveFile>, StorageError>;

    /// Downloads the raw content of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError>;

    /// Moves a file so that `destination_folder_id` is its only parent.
    async fn move_file(
        &self,
        file_id: &str,
        destination_folder_id: &str,
    ) -> Result<(), StorageError>;
}
