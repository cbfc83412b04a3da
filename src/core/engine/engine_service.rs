// The poll cycle.
//
// One cycle: resolve prompts, then for every source folder list its images
// and push each one through download -> caption -> webhook -> move. Files are
// handled strictly one at a time. Every discovered file is routed to exactly
// one terminal folder: processed when all stages succeed, errors otherwise.
// Failures are logged with the file, tag and stage and never abort the cycle.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;

use crate::core::captions::{
    resolve_prompts, CaptionProvider, CaptionService, GenerationError, PromptSet,
};
use crate::core::storage::{
    DriveFile, FolderLayout, MimeFilter, Platform, SourceTag, StorageClient, StorageError,
};
use crate::core::webhook::{DispatchError, WebhookPayload, WebhookSink};

use super::scheduler::Scheduler;

/// Why a single file failed before it could be archived.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to download file: {0}")]
    Download(#[source] StorageError),
    #[error("Caption generation for {platform} failed: {source}")]
    Generation {
        platform: Platform,
        #[source]
        source: GenerationError,
    },
    #[error("No caption produced for the folder's platform")]
    MissingCaption,
    #[error("Webhook dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl ProcessError {
    pub fn stage(&self) -> &'static str {
        match self {
            ProcessError::Download(_) => "download",
            ProcessError::Generation { .. } | ProcessError::MissingCaption => "generate",
            ProcessError::Dispatch(_) => "dispatch",
        }
    }
}

/// Terminal folder a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Processed,
    Quarantine,
}

impl Destination {
    fn as_str(self) -> &'static str {
        match self {
            Destination::Processed => "processed",
            Destination::Quarantine => "errors",
        }
    }
}

/// Where a file ended up after the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Processed,
    Quarantined,
    /// The move itself failed, so the file is still in its source folder and
    /// will be picked up again next cycle.
    Stranded { intended: Destination },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: DriveFile,
    pub tag: SourceTag,
    pub outcome: FileOutcome,
}

/// Summary of one poll cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub files: Vec<FileReport>,
    /// Folders whose listing failed this cycle.
    pub skipped_folders: Vec<SourceTag>,
}

impl CycleReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn processed(&self) -> usize {
        self.count(|o| *o == FileOutcome::Processed)
    }

    pub fn quarantined(&self) -> usize {
        self.count(|o| *o == FileOutcome::Quarantined)
    }

    pub fn stranded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Stranded { .. }))
    }
}

pub struct SocialEngine<S, P, W>
where
    S: StorageClient,
    P: CaptionProvider,
    W: WebhookSink,
{
    storage: S,
    captions: CaptionService<P>,
    webhook: W,
    layout: FolderLayout,
}

impl<S, P, W> SocialEngine<S, P, W>
where
    S: StorageClient,
    P: CaptionProvider,
    W: WebhookSink,
{
    pub fn new(storage: S, captions: CaptionService<P>, webhook: W, layout: FolderLayout) -> Self {
        Self {
            storage,
            captions,
            webhook,
            layout,
        }
    }

    /// Runs cycles on the scheduler until its token is cancelled.
    pub async fn run(&self, scheduler: &Scheduler) -> usize {
        scheduler.run(|| self.run_logged_cycle()).await
    }

    async fn run_logged_cycle(&self) {
        tracing::info!("Starting poll cycle...");
        let report = self.run_cycle().await;
        tracing::info!(
            processed = report.processed(),
            quarantined = report.quarantined(),
            stranded = report.stranded(),
            skipped_folders = report.skipped_folders.len(),
            "Cycle complete"
        );

        for entry in &report.files {
            if let FileOutcome::Stranded { intended } = entry.outcome {
                tracing::warn!(
                    file_id = %entry.file.id,
                    tag = %entry.tag,
                    intended = intended.as_str(),
                    "File {} is still in its source folder and will be retried next cycle",
                    entry.file.name
                );
            }
        }
    }

    /// Runs a single poll cycle over every source folder.
    pub async fn run_cycle(&self) -> CycleReport {
        let prompts = resolve_prompts(&self.storage, self.layout.prompt_folder.as_deref()).await;
        let mut report = CycleReport::default();

        for folder in &self.layout.sources {
            let items = match self.storage.list_files(&folder.id, MimeFilter::Images).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        tag = %folder.tag,
                        folder_id = %folder.id,
                        error = %e,
                        "Listing failed, skipping folder this cycle"
                    );
                    report.skipped_folders.push(folder.tag);
                    continue;
                }
            };

            if items.is_empty() {
                tracing::debug!(tag = %folder.tag, "No images found");
                continue;
            }

            tracing::info!("Found {} images in {} folder.", items.len(), folder.tag);
            for item in items {
                let outcome = self.process_file(&item, folder.tag, &prompts).await;
                report.files.push(FileReport {
                    file: item,
                    tag: folder.tag,
                    outcome,
                });
            }
        }

        report
    }

    async fn process_file(&self, file: &DriveFile, tag: SourceTag, prompts: &PromptSet) -> FileOutcome {
        tracing::info!(file_id = %file.id, tag = %tag, "Processing file {}", file.name);

        let destination = match self.caption_and_dispatch(file, tag, prompts).await {
            Ok(()) => Destination::Processed,
            Err(e) => {
                tracing::error!(
                    file_id = %file.id,
                    file = %file.name,
                    tag = %tag,
                    stage = e.stage(),
                    error = %e,
                    "Error processing file"
                );
                Destination::Quarantine
            }
        };

        self.route(file, tag, destination).await
    }

    async fn caption_and_dispatch(
        &self,
        file: &DriveFile,
        tag: SourceTag,
        prompts: &PromptSet,
    ) -> Result<(), ProcessError> {
        let media = self
            .storage
            .download(&file.id)
            .await
            .map_err(ProcessError::Download)?;

        let mut captions = BTreeMap::new();
        for &platform in tag.platforms() {
            let caption = self
                .captions
                .caption(&media, &file.mime_type, prompts.get(platform))
                .await
                .map_err(|source| ProcessError::Generation { platform, source })?;
            captions.insert(platform, caption);
        }

        let payload = WebhookPayload::new(file, tag, captions, &media, Utc::now())
            .ok_or(ProcessError::MissingCaption)?;

        tracing::info!("Sending webhook for {}...", file.name);
        self.webhook.dispatch(&payload).await?;
        tracing::info!(file_id = %file.id, "Webhook success");

        Ok(())
    }

    async fn route(&self, file: &DriveFile, tag: SourceTag, destination: Destination) -> FileOutcome {
        let folder_id = match destination {
            Destination::Processed => &self.layout.processed,
            Destination::Quarantine => &self.layout.errors,
        };

        match self.storage.move_file(&file.id, folder_id).await {
            Ok(()) => {
                tracing::info!(
                    file_id = %file.id,
                    destination = destination.as_str(),
                    "Moved file {} to {}",
                    file.name,
                    folder_id
                );
                match destination {
                    Destination::Processed => FileOutcome::Processed,
                    Destination::Quarantine => FileOutcome::Quarantined,
                }
            }
            Err(e) => {
                tracing::error!(
                    file_id = %file.id,
                    file = %file.name,
                    tag = %tag,
                    stage = "move",
                    destination = destination.as_str(),
                    error = %e,
                    "Failed to move file; it stays in the source folder"
                );
                FileOutcome::Stranded {
                    intended: destination,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::CaptionRequest;
    use crate::core::storage::SourceFolder;
    use crate::infra::storage::InMemoryDrive;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that returns a fixed caption per prompt and rejects empty media
    /// the way the real API does.
    struct ScriptedProvider {
        replies: Vec<(String, Result<String, u16>)>,
        fallback: String,
    }

    impl ScriptedProvider {
        fn always(caption: &str) -> Self {
            Self {
                replies: Vec::new(),
                fallback: caption.to_string(),
            }
        }

        fn with_reply(mut self, prompt: &str, reply: Result<&str, u16>) -> Self {
            self.replies
                .push((prompt.to_string(), reply.map(|s| s.to_string())));
            self
        }
    }

    #[async_trait]
    impl CaptionProvider for ScriptedProvider {
        async fn generate(&self, request: &CaptionRequest<'_>) -> Result<String, GenerationError> {
            if request.media.is_empty() {
                return Err(GenerationError::Api {
                    status: 400,
                    message: "Request contains an empty inline data part".to_string(),
                });
            }

            match self.replies.iter().find(|(p, _)| p == request.prompt) {
                Some((_, Ok(caption))) => Ok(caption.clone()),
                Some((_, Err(status))) => Err(GenerationError::Api {
                    status: *status,
                    message: "scripted failure".to_string(),
                }),
                None => Ok(self.fallback.clone()),
            }
        }
    }

    struct RecordingWebhook {
        status: u16,
        received: Mutex<Vec<WebhookPayload>>,
    }

    impl RecordingWebhook {
        fn returning(status: u16) -> Self {
            Self {
                status,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WebhookSink for RecordingWebhook {
        async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError> {
            self.received.lock().unwrap().push(payload.clone());
            if (200..300).contains(&self.status) {
                Ok(())
            } else {
                Err(DispatchError::Status {
                    status: self.status,
                    body: "Internal Server Error".to_string(),
                })
            }
        }
    }

    fn layout() -> FolderLayout {
        FolderLayout {
            sources: vec![
                SourceFolder {
                    id: "linkedin-src".to_string(),
                    tag: SourceTag::Linkedin,
                },
                SourceFolder {
                    id: "meta-src".to_string(),
                    tag: SourceTag::Meta,
                },
                SourceFolder {
                    id: "gbp-src".to_string(),
                    tag: SourceTag::Gbp,
                },
                SourceFolder {
                    id: "all-src".to_string(),
                    tag: SourceTag::All,
                },
            ],
            prompt_folder: Some("config".to_string()),
            processed: "processed".to_string(),
            errors: "errors".to_string(),
        }
    }

    fn engine(
        drive: InMemoryDrive,
        provider: ScriptedProvider,
        webhook: RecordingWebhook,
    ) -> SocialEngine<InMemoryDrive, ScriptedProvider, RecordingWebhook> {
        SocialEngine::new(drive, CaptionService::new(provider), webhook, layout())
    }

    #[tokio::test]
    async fn test_successful_file_is_archived_and_posted() {
        let drive = InMemoryDrive::new();
        drive.add_file("linkedin-src", "f1", "post1.jpg", "image/jpeg", b"jpeg-bytes");

        let engine = engine(
            drive,
            ScriptedProvider::always("Exciting update!"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.processed(), 1);
        assert_eq!(engine.storage.file_names("processed"), vec!["post1.jpg".to_string()]);
        assert!(engine.storage.file_names("errors").is_empty());
        assert!(engine.storage.file_names("linkedin-src").is_empty());

        let received = engine.webhook.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].file, "post1.jpg");
        assert_eq!(received[0].tag, SourceTag::Linkedin);
        assert_eq!(received[0].caption, "Exciting update!");
        assert_eq!(received[0].image, "anBlZy1ieXRlcw==");
    }

    #[tokio::test]
    async fn test_webhook_failure_quarantines_file() {
        let drive = InMemoryDrive::new();
        drive.add_file("linkedin-src", "f1", "post1.jpg", "image/jpeg", b"jpeg-bytes");

        let engine = engine(
            drive,
            ScriptedProvider::always("Exciting update!"),
            RecordingWebhook::returning(500),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.quarantined(), 1);
        assert_eq!(engine.storage.file_names("errors"), vec!["post1.jpg".to_string()]);
        assert!(engine.storage.file_names("processed").is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_routes_to_error() {
        let drive = InMemoryDrive::new();
        drive.add_file("meta-src", "f1", "blank.png", "image/png", b"");

        let engine = engine(
            drive,
            ScriptedProvider::always("never used"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.quarantined(), 1);
        assert_eq!(engine.storage.file_names("errors"), vec!["blank.png".to_string()]);
        assert!(engine.webhook.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_skips_only_that_folder() {
        let drive = InMemoryDrive::new();
        drive.add_file("linkedin-src", "f1", "a.jpg", "image/jpeg", b"1");
        drive.add_file("meta-src", "f2", "b.jpg", "image/jpeg", b"2");
        drive.add_file("gbp-src", "f3", "c.jpg", "image/jpeg", b"3");
        drive.add_file("all-src", "f4", "d.jpg", "image/jpeg", b"4");
        drive.fail_listing("meta-src");

        let engine = engine(
            drive,
            ScriptedProvider::always("caption"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.skipped_folders, vec![SourceTag::Meta]);
        assert_eq!(report.processed(), 3);
        assert_eq!(
            engine.storage.file_names("processed"),
            vec!["a.jpg".to_string(), "c.jpg".to_string(), "d.jpg".to_string()]
        );
        assert_eq!(engine.storage.file_names("meta-src"), vec!["b.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_every_discovered_file_reaches_one_terminal_folder() {
        let drive = InMemoryDrive::new();
        drive.add_file("linkedin-src", "ok1", "ok1.jpg", "image/jpeg", b"x");
        drive.add_file("linkedin-src", "bad1", "bad1.jpg", "image/jpeg", b"x");
        drive.add_file("gbp-src", "ok2", "ok2.jpg", "image/jpeg", b"x");
        drive.add_file("gbp-src", "empty", "empty.jpg", "image/jpeg", b"");
        drive.add_file("gbp-src", "notes", "notes.txt", "text/plain", b"x");
        drive.fail_download("bad1");

        let engine = engine(
            drive,
            ScriptedProvider::always("caption"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.files.len(), 4);
        assert_eq!(report.processed(), 2);
        assert_eq!(report.quarantined(), 2);
        assert!(engine.storage.file_names("linkedin-src").is_empty());
        // Non-image files are never discovered, so they stay put.
        assert_eq!(engine.storage.file_names("gbp-src"), vec!["notes.txt".to_string()]);

        let mut processed = engine.storage.file_names("processed");
        let mut errors = engine.storage.file_names("errors");
        processed.sort();
        errors.sort();
        assert_eq!(processed, vec!["ok1.jpg".to_string(), "ok2.jpg".to_string()]);
        assert_eq!(errors, vec!["bad1.jpg".to_string(), "empty.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_all_folder_sends_every_platform_caption() {
        let drive = InMemoryDrive::new();
        drive.add_file("all-src", "f1", "team.jpg", "image/jpeg", b"x");
        drive.add_file("config", "p1", "prompt_meta.txt", "text/plain", b"Meta prompt");

        let provider = ScriptedProvider::always("default caption")
            .with_reply("Meta prompt", Ok("Meta caption"));
        let engine = engine(drive, provider, RecordingWebhook::returning(200));
        engine.run_cycle().await;

        let received = engine.webhook.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let payload = &received[0];
        assert_eq!(payload.tag, SourceTag::All);
        assert_eq!(payload.captions.len(), 3);
        assert_eq!(payload.captions[&Platform::Meta], "Meta caption");
        assert_eq!(payload.captions[&Platform::Linkedin], "default caption");
        assert_eq!(payload.caption, "default caption");
    }

    #[tokio::test]
    async fn test_one_failed_platform_quarantines_all_file() {
        let drive = InMemoryDrive::new();
        drive.add_file("all-src", "f1", "team.jpg", "image/jpeg", b"x");

        let provider = ScriptedProvider::always("ok").with_reply(
            crate::core::captions::prompts::DEFAULT_PROMPT_GBP,
            Err(503),
        );
        let engine = engine(drive, provider, RecordingWebhook::returning(200));
        let report = engine.run_cycle().await;

        assert_eq!(report.quarantined(), 1);
        assert!(engine.webhook.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_move_strands_file_and_cycle_continues() {
        let drive = InMemoryDrive::new();
        drive.add_file("linkedin-src", "stuck", "stuck.jpg", "image/jpeg", b"x");
        drive.add_file("linkedin-src", "fine", "fine.jpg", "image/jpeg", b"x");
        drive.fail_moves("stuck");

        let engine = engine(
            drive,
            ScriptedProvider::always("caption"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert_eq!(report.stranded(), 1);
        assert_eq!(report.processed(), 1);
        assert_eq!(
            report.files[0].outcome,
            FileOutcome::Stranded {
                intended: Destination::Processed
            }
        );
        assert_eq!(engine.storage.file_names("linkedin-src"), vec!["stuck.jpg".to_string()]);
        assert_eq!(engine.storage.file_names("processed"), vec!["fine.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_folders_produce_empty_report() {
        let engine = engine(
            InMemoryDrive::new(),
            ScriptedProvider::always("caption"),
            RecordingWebhook::returning(200),
        );
        let report = engine.run_cycle().await;

        assert!(report.files.is_empty());
        assert!(report.skipped_folders.is_empty());
    }

    #[test]
    fn test_process_error_stages() {
        let download = ProcessError::Download(StorageError::Request("timeout".to_string()));
        let generate = ProcessError::Generation {
            platform: Platform::Meta,
            source: GenerationError::Empty,
        };
        let dispatch = ProcessError::Dispatch(DispatchError::Status {
            status: 500,
            body: String::new(),
        });

        assert_eq!(download.stage(), "download");
        assert_eq!(generate.stage(), "generate");
        assert_eq!(dispatch.stage(), "dispatch");
        assert!(generate.to_string().contains("meta"));
    }
}
