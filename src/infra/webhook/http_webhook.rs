use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::core::webhook::{DispatchError, WebhookPayload, WebhookSink};

/// Posts payloads (captions plus the base64 image) as JSON to a fixed
/// webhook URL (a Make.com scenario in production). Any non-2xx answer is a
/// failure; nothing is retried.
pub struct HttpWebhook {
    client: Client,
    url: Url,
}

impl HttpWebhook {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl WebhookSink for HttpWebhook {
    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = status.as_u16(), file_id = %payload.file_id, "Webhook accepted payload");
        Ok(())
    }
}
