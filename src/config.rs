// Startup configuration.
//
// Everything comes from environment variables (after `dotenv` has loaded a
// `.env` file, if any). The result is built once in `main` and handed to the
// components; nothing reads the environment after startup.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::core::storage::{FolderLayout, SourceFolder, SourceTag};
use crate::infra::ai::gemini_client::DEFAULT_GEMINI_MODEL;
use crate::infra::google::ServiceAccountKey;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Source folder variables and the tag each one carries, in polling order.
const SOURCE_FOLDER_VARS: [(&str, SourceTag); 4] = [
    ("ID_LINKEDIN", SourceTag::Linkedin),
    ("ID_META", SourceTag::Meta),
    ("ID_GBP", SourceTag::Gbp),
    ("ID_ALL", SourceTag::All),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("No source folders configured; set at least one of ID_LINKEDIN, ID_META, ID_GBP, ID_ALL")]
    NoSourceFolders,
}

pub struct Config {
    pub service_account: ServiceAccountKey,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub webhook_url: Url,
    pub folders: FolderLayout,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let service_account = load_service_account(&get)?;
        let gemini_api_key = require("GEMINI_API_KEY")?;
        let gemini_model = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let webhook_url = parse_webhook_url(&require("MAKE_WEBHOOK_URL")?)?;

        let sources: Vec<SourceFolder> = SOURCE_FOLDER_VARS
            .iter()
            .filter_map(|&(name, tag)| get(name).map(|id| SourceFolder { id, tag }))
            .collect();
        if sources.is_empty() {
            return Err(ConfigError::NoSourceFolders);
        }

        let folders = FolderLayout {
            sources,
            prompt_folder: get("ID_CONFIG"),
            processed: require("ID_PROCESSED")?,
            errors: require("ID_ERRORS")?,
        };

        let poll_interval =
            parse_seconds("POLL_INTERVAL_SECS", get("POLL_INTERVAL_SECS"), DEFAULT_POLL_INTERVAL_SECS)?;
        let http_timeout =
            parse_seconds("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            service_account,
            gemini_api_key,
            gemini_model,
            webhook_url,
            folders,
            poll_interval,
            http_timeout,
        })
    }
}

/// Reads the key from `GOOGLE_CREDS_JSON`, or from the file named by
/// `GOOGLE_CREDS_FILE` when the inline variable is unset.
fn load_service_account<G>(get: &G) -> Result<ServiceAccountKey, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let (name, json) = if let Some(json) = get("GOOGLE_CREDS_JSON") {
        ("GOOGLE_CREDS_JSON", json)
    } else if let Some(path) = get("GOOGLE_CREDS_FILE") {
        let json = std::fs::read_to_string(&path).map_err(|e| ConfigError::Invalid {
            name: "GOOGLE_CREDS_FILE",
            reason: format!("cannot read {}: {}", path, e),
        })?;
        ("GOOGLE_CREDS_FILE", json)
    } else {
        return Err(ConfigError::Missing("GOOGLE_CREDS_JSON"));
    };

    let key: ServiceAccountKey = serde_json::from_str(&json).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("credentials are not a service account key: {}", e),
    })?;

    if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
        return Err(ConfigError::Invalid {
            name,
            reason: "client_email and private_key must not be empty".to_string(),
        });
    }

    Ok(key)
}

fn parse_webhook_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: "MAKE_WEBHOOK_URL",
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name: "MAKE_WEBHOOK_URL",
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn parse_seconds(
    name: &'static str,
    raw: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a positive number of seconds, got '{}'", raw),
        }),
    }
}
