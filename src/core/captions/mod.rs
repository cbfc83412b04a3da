pub mod caption_service;
pub mod prompts;

pub use caption_service::{CaptionProvider, CaptionRequest, CaptionService, GenerationError};
pub use prompts::{resolve_prompts, PromptSet};
