// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements `CaptionProvider` against Gemini's `generateContent` endpoint
// (https://ai.google.dev/api/generate-content).
//
// **Request shape:**
// - Authentication: API key as a query parameter (`?key=API_KEY`).
// - `systemInstruction` is a separate top-level field.
// - One user turn whose `parts` are the image (`inlineData`, base64) followed
//   by the platform prompt (`text`).
//
// **Response shape:** text lives at `candidates[0].content.parts[*].text`.
// When the prompt is blocked there are no candidates and
// `promptFeedback.blockReason` says why.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - defaults to `gemini-2.0-flash`

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::captions::{CaptionProvider, CaptionRequest, GenerationError};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================

/// Inline binary data (our image), base64 encoded.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// A single part of content. Gemini uses a "parts" array to support
/// multimodal content.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    /// "user" or "model". Absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// The request body sent to the Gemini generateContent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

pub struct GeminiClient {
    /// HTTP client for making requests. Carries the request timeout.
    client: Client,

    /// API key for authentication.
    api_key: String,

    model: String,

    base_url: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn text_part(text: &str) -> Part {
        Part {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn build_request(request: &CaptionRequest<'_>) -> GenerateContentRequest {
        let image = Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: request.mime_type.to_string(),
                data: STANDARD.encode(request.media),
            }),
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![image, Self::text_part(request.prompt)],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Self::text_part(request.system_instruction)],
            },
        }
    }

    /// Pulls the caption text out of a successful response.
    fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
        let candidate = match response.candidates.and_then(|c| c.into_iter().next()) {
            Some(candidate) => candidate,
            None => {
                let reason = response
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates returned".to_string());
                return Err(GenerationError::NoContent(reason));
            }
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "empty candidate".to_string());
            return Err(GenerationError::NoContent(reason));
        }

        Ok(text)
    }
}

/// The request URL carries the API key, so it is stripped before the error
/// text reaches any log.
fn request_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Request(e.without_url().to_string())
    }
}

#[async_trait]
impl CaptionProvider for GeminiClient {
    async fn generate(&self, request: &CaptionRequest<'_>) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = Self::build_request(request);

        // Never log the URL with the key in it.
        tracing::debug!(
            "Gemini request to model {}: {} bytes of {}",
            self.model,
            request.media.len(),
            request.mime_type
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<GeminiErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(GenerationError::Api { status, message });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(request_error)?;
        let text = Self::extract_text(parsed)?;

        tracing::debug!("Gemini response received: {} chars", text.len());
        Ok(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================
