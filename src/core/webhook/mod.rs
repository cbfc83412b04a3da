pub mod webhook_models;

pub use webhook_models::{DispatchError, WebhookPayload, WebhookSink};
