// Prompt resolution.
//
// Operators tune captions by dropping `prompt_<platform>.txt` files into the
// configuration folder. Prompts are re-read at the start of every cycle, so
// edits take effect without a restart. Anything that goes wrong here falls
// back to the built-in defaults: a bad prompt file must never stop polling.

use crate::core::storage::{MimeFilter, Platform, StorageClient};

pub const DEFAULT_PROMPT_LINKEDIN: &str =
    "Write a professional, craftsmanship-focused LinkedIn caption for this image.";
pub const DEFAULT_PROMPT_META: &str =
    "Write a casual, engaging Facebook/Instagram caption for this image.";
pub const DEFAULT_PROMPT_GBP: &str = "Write an SEO-heavy Google Business Profile caption for this image with a 'Call us' CTA and no hashtags.";

/// One prompt per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    linkedin: String,
    meta: String,
    gbp: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            linkedin: DEFAULT_PROMPT_LINKEDIN.to_string(),
            meta: DEFAULT_PROMPT_META.to_string(),
            gbp: DEFAULT_PROMPT_GBP.to_string(),
        }
    }
}

impl PromptSet {
    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::Linkedin => &self.linkedin,
            Platform::Meta => &self.meta,
            Platform::Gbp => &self.gbp,
        }
    }

    fn set(&mut self, platform: Platform, prompt: String) {
        match platform {
            Platform::Linkedin => self.linkedin = prompt,
            Platform::Meta => self.meta = prompt,
            Platform::Gbp => self.gbp = prompt,
        }
    }
}

/// Builds the prompt set for one cycle.
pub async fn resolve_prompts<S>(storage: &S, prompt_folder: Option<&str>) -> PromptSet
where
    S: StorageClient + ?Sized,
{
    let mut prompts = PromptSet::default();

    let Some(folder_id) = prompt_folder else {
        return prompts;
    };

    let files = match storage.list_files(folder_id, MimeFilter::PlainText).await {
        Ok(files) => files,
        Err(e) => {
            tracing::error!(folder_id, error = %e, "Error fetching prompts, using defaults");
            return prompts;
        }
    };

    // Every matching file is read in listing order, so a later non-empty
    // duplicate still wins over an earlier empty or unreadable one.
    for file in &files {
        let name = file.name.to_lowercase();
        let Some(platform) = Platform::ALL
            .into_iter()
            .find(|p| p.prompt_file_name() == name)
        else {
            continue;
        };

        match storage.download(&file.id).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                if text.is_empty() {
                    tracing::warn!(file = %file.name, "Prompt file is empty, keeping previous prompt");
                } else {
                    prompts.set(platform, text);
                }
            }
            Err(e) => {
                tracing::warn!(file_id = %file.id, error = %e, "Failed to read prompt file");
            }
        }
    }

    tracing::debug!("Prompts loaded for {} platforms", Platform::ALL.len());
    prompts
}
