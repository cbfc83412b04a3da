// Google Drive integration.
// - `service_account.rs` turns a service account key into access tokens.
// - `drive_client.rs` implements the core `StorageClient` over Drive v3.

pub mod drive_client;
pub mod service_account;

pub use drive_client::DriveClient;
pub use service_account::{ServiceAccountAuth, ServiceAccountKey};
