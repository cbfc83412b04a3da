pub mod storage_models;

pub use storage_models::{
    DriveFile, FolderLayout, MimeFilter, Platform, SourceFolder, SourceTag, StorageClient,
    StorageError,
};
