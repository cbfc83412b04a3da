use async_trait::async_trait;
use thiserror::Error;

/// Instruction sent with every caption request so the model answers with the
/// caption alone.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a social media engine. Output ONLY the caption. Do not output conversational filler.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Caption request failed: {0}")]
    Request(String),
    #[error("Caption request timed out")]
    Timeout,
    #[error("Caption API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("No caption in response: {0}")]
    NoContent(String),
    #[error("Model returned an empty caption")]
    Empty,
}

/// One multimodal caption request: the image plus the platform prompt.
#[derive(Debug, Clone, Copy)]
pub struct CaptionRequest<'a> {
    pub system_instruction: &'a str,
    pub prompt: &'a str,
    pub media: &'a [u8],
    pub mime_type: &'a str,
}

/// A generative-text backend. `infra::ai::GeminiClient` is the real one.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Returns the raw model text for the request.
    async fn generate(&self, request: &CaptionRequest<'_>) -> Result<String, GenerationError>;
}

pub struct CaptionService<P: CaptionProvider> {
    provider: P,
    system_instruction: String,
}

impl<P: CaptionProvider> CaptionService<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }

    /// Generates a single caption. Whitespace is trimmed and a blank answer
    /// counts as a failure, since there is nothing to post.
    pub async fn caption(
        &self,
        media: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let request = CaptionRequest {
            system_instruction: &self.system_instruction,
            prompt,
            media,
            mime_type,
        };

        let raw = self.provider.generate(&request).await?;
        let caption = raw.trim();
        if caption.is_empty() {
            return Err(GenerationError::Empty);
        }

        Ok(caption.to_string())
    }
}
