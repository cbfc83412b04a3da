use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::storage::{DriveFile, Platform, SourceTag};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Webhook request failed: {0}")]
    Request(String),
    #[error("Webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// JSON body posted once per successfully captioned file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookPayload {
    pub file_id: String,
    /// File name.
    pub file: String,
    pub mime_type: String,
    pub tag: SourceTag,
    /// Same as `tag`; kept for scenarios that route on `target`.
    pub target: SourceTag,
    /// Caption for the folder's own platform (first platform for `all`).
    pub caption: String,
    pub captions: BTreeMap<Platform, String>,
    /// The image itself, base64 encoded, so the scenario can publish it.
    pub image: String,
    pub timestamp: DateTime<Utc>,
}

impl WebhookPayload {
    /// Returns `None` when there is no caption for the tag's primary platform.
    pub fn new(
        file: &DriveFile,
        tag: SourceTag,
        captions: BTreeMap<Platform, String>,
        media: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let primary = tag.platforms().first()?;
        let caption = captions.get(primary)?.clone();

        Some(Self {
            file_id: file.id.clone(),
            file: file.name.clone(),
            mime_type: file.mime_type.clone(),
            tag,
            target: tag,
            caption,
            captions,
            image: STANDARD.encode(media),
            timestamp,
        })
    }
}

/// Where finished captions go. `infra::webhook::HttpWebhook` posts them.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError>;
}
