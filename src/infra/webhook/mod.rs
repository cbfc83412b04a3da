pub mod http_webhook;

pub use http_webhook::HttpWebhook;
