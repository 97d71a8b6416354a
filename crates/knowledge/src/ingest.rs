//! Content ingestion: turning uploads into searchable text.
//!
//! [`Ingestor::submit`] records the item and returns at once. Free text is
//! stored completed; every other modality is stored pending and normalized by
//! a background task running [`ContentProcessor::process`].

use base64::Engine;
use chrono::{DateTime, Utc};
use secondbrain_core::error::StoreError;
use secondbrain_core::knowledge::{
    truncate_chars, ItemStatus, KnowledgeItem, KnowledgeStore, Modality, NewKnowledgeItem,
};
use secondbrain_core::message::ConversationTurn;
use secondbrain_core::provider::{Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DOCUMENT_INSTRUCTION: &str = "Extract and summarize the key information from this document. \
Preserve important facts, dates, names, and concepts. Format the output as clear, searchable text.";

const WEB_INSTRUCTION: &str = "Extract and summarize the main content from this webpage. \
Focus on the article or main content, ignoring navigation, ads, and boilerplate. \
Preserve key facts and information.";

const IMAGE_INSTRUCTION: &str = "Describe this image in detail. Include any text, objects, \
people, colors, and context you can identify. Make the description searchable and informative.";

pub const AUDIO_PLACEHOLDER: &str =
    "Audio transcription: [Audio file uploaded - transcription service integration pending]";
pub const DOCUMENT_FAILED: &str = "Document processing failed";
pub const WEB_FAILED: &str = "Web content extraction failed";
pub const IMAGE_PENDING: &str = "Image uploaded - description pending";
pub const IMAGE_FAILED: &str = "Image processing failed";
pub const IMAGE_UPLOADED: &str = "Image uploaded";

/// Ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid ingest request: {0}")]
    Invalid(String),

    #[error("Failed to fetch source: {0}")]
    Fetch(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A request to add content to the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Path of an uploaded file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Free text, for the `text` modality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub modality: Modality,
}

impl IngestRequest {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.file_name.is_none() && self.url.is_none() && self.text.is_none() {
            return Err(IngestError::Invalid(
                "one of fileName, url or text is required".into(),
            ));
        }
        match self.modality {
            Modality::Text if self.text.as_deref().is_none_or(|t| t.trim().is_empty()) => Err(
                IngestError::Invalid("text modality requires non-empty text".into()),
            ),
            Modality::Text => Ok(()),
            other if self.locator().is_none() => Err(IngestError::Invalid(format!(
                "{other} modality requires fileName or url"
            ))),
            _ => Ok(()),
        }
    }

    /// Where non-text content is read from.
    fn locator(&self) -> Option<&str> {
        self.file_name.as_deref().or(self.url.as_deref())
    }

    fn into_new_item(self, captured_at: DateTime<Utc>) -> NewKnowledgeItem {
        let title = self
            .title
            .clone()
            .or_else(|| self.file_name.clone())
            .or_else(|| self.url.clone())
            .unwrap_or_else(|| "Untitled note".into());

        let item = match (self.modality, self.text) {
            (Modality::Text, Some(text)) => NewKnowledgeItem::text(title, text),
            (modality, _) => {
                let locator = self.file_name.or(self.url).unwrap_or_default();
                NewKnowledgeItem::pending(title, modality, locator)
            }
        };
        item.captured_at(captured_at)
    }
}

/// Size and time limits applied while normalizing content.
#[derive(Debug, Clone)]
pub struct IngestLimits {
    pub max_input_chars: usize,
    pub document_fallback_chars: usize,
    pub web_fallback_chars: usize,
    pub fetch_timeout: Duration,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_input_chars: 50_000,
            document_fallback_chars: 10_000,
            web_fallback_chars: 5_000,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Normalizes one pending item into searchable text.
pub struct ContentProcessor {
    store: Arc<dyn KnowledgeStore>,
    provider: Arc<dyn Provider>,
    http: reqwest::Client,
    model: String,
    limits: IngestLimits,
}

impl ContentProcessor {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        limits: IngestLimits,
    ) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(limits.fetch_timeout)
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        Ok(Self {
            store,
            provider,
            http,
            model: model.into(),
            limits,
        })
    }

    /// Run the item through `processing` to `completed`, or `failed` when the
    /// result cannot be stored.
    pub async fn process(&self, item: &KnowledgeItem) -> Result<(), IngestError> {
        self.store.set_status(&item.id, ItemStatus::Processing).await?;
        debug!(id = %item.id, modality = %item.modality, "Processing knowledge item");

        let content = self.normalize(item).await;

        if let Err(e) = self.store.complete(&item.id, &content).await {
            warn!(id = %item.id, error = %e, "Failed to store processed content");
            if let Err(mark) = self.store.set_status(&item.id, ItemStatus::Failed).await {
                warn!(id = %item.id, error = %mark, "Failed to mark item as failed");
            }
            return Err(e.into());
        }

        info!(id = %item.id, chars = content.chars().count(), "Knowledge item processed");
        Ok(())
    }

    async fn normalize(&self, item: &KnowledgeItem) -> String {
        match item.modality {
            Modality::Text => item
                .processed_content
                .clone()
                .unwrap_or_else(|| item.original_content.clone()),
            Modality::Document => {
                let raw = match self.fetch_source(&item.original_content).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(id = %item.id, error = %e, "Document fetch failed");
                        return DOCUMENT_FAILED.into();
                    }
                };
                let input = truncate_chars(&raw, self.limits.max_input_chars);
                let prompt = format!("Document content:\n\n{input}");
                self.summarize(DOCUMENT_INSTRUCTION, prompt)
                    .await
                    .unwrap_or_else(|| {
                        truncate_chars(&raw, self.limits.document_fallback_chars).to_string()
                    })
            }
            Modality::Web => {
                let raw = match self.fetch_source(&item.original_content).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(id = %item.id, error = %e, "Web fetch failed");
                        return WEB_FAILED.into();
                    }
                };
                let input = truncate_chars(&raw, self.limits.max_input_chars);
                let prompt = format!("Webpage content from {}:\n\n{input}", item.original_content);
                self.summarize(WEB_INSTRUCTION, prompt)
                    .await
                    .unwrap_or_else(|| truncate_chars(input, self.limits.web_fallback_chars).to_string())
            }
            Modality::Audio => AUDIO_PLACEHOLDER.into(),
            Modality::Image => {
                let image_url = match image_url(&item.original_content).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(id = %item.id, error = %e, "Image read failed");
                        return IMAGE_FAILED.into();
                    }
                };
                let request = ProviderRequest::new(
                    &self.model,
                    vec![ConversationTurn::user_with_image(IMAGE_INSTRUCTION, image_url)],
                );
                match self.provider.complete(request).await {
                    Ok(response) if !response.content.trim().is_empty() => response.content,
                    Ok(_) => IMAGE_UPLOADED.into(),
                    // The backend answered, but with an error status
                    Err(e) if e.status_code().is_some() => {
                        warn!(id = %item.id, error = %e, "Image description rejected");
                        IMAGE_PENDING.into()
                    }
                    Err(e) => {
                        warn!(id = %item.id, error = %e, "Image description failed");
                        IMAGE_FAILED.into()
                    }
                }
            }
        }
    }

    /// Ask the model for a summary; `None` when it fails or returns nothing.
    async fn summarize(&self, instruction: &str, prompt: String) -> Option<String> {
        let request = ProviderRequest::new(
            &self.model,
            vec![
                ConversationTurn::system(instruction),
                ConversationTurn::user(prompt),
            ],
        );

        match self.provider.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content),
            Ok(_) => None,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Summarization failed, storing raw text");
                None
            }
        }
    }

    /// Read a locator: HTTP(S) URLs are downloaded, anything else is a local path.
    async fn fetch_source(&self, locator: &str) -> Result<String, IngestError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            let response = self
                .http
                .get(locator)
                .send()
                .await
                .map_err(|e| IngestError::Fetch(e.to_string()))?
                .error_for_status()
                .map_err(|e| IngestError::Fetch(e.to_string()))?;
            response
                .text()
                .await
                .map_err(|e| IngestError::Fetch(e.to_string()))
        } else {
            let bytes = tokio::fs::read(locator)
                .await
                .map_err(|e| IngestError::Fetch(format!("{locator}: {e}")))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// A URL the model can load: remote and `data:` URLs pass through, local
/// files are inlined as base64 `data:` URLs.
async fn image_url(locator: &str) -> Result<String, IngestError> {
    if ["http://", "https://", "data:"].iter().any(|p| locator.starts_with(*p)) {
        return Ok(locator.to_string());
    }

    let bytes = tokio::fs::read(locator)
        .await
        .map_err(|e| IngestError::Fetch(format!("{locator}: {e}")))?;
    let ext = std::path::Path::new(locator)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

/// The result of accepting an ingest request.
pub struct Submitted {
    pub item: KnowledgeItem,

    /// Background processing, absent for items stored completed
    pub task: Option<JoinHandle<()>>,
}

/// Accepts ingest requests and schedules their processing.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
    processor: Arc<ContentProcessor>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn KnowledgeStore>, processor: Arc<ContentProcessor>) -> Self {
        Self { store, processor }
    }

    /// Record the item and start processing it in the background.
    pub async fn submit(&self, request: IngestRequest) -> Result<Submitted, IngestError> {
        request.validate()?;
        let item = self.store.insert(request.into_new_item(Utc::now())).await?;
        info!(id = %item.id, modality = %item.modality, status = %item.status, "Knowledge item accepted");

        if item.status != ItemStatus::Pending {
            return Ok(Submitted { item, task: None });
        }

        let processor = Arc::clone(&self.processor);
        let pending = item.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = processor.process(&pending).await {
                warn!(id = %pending.id, error = %e, "Background processing failed");
            }
        });

        Ok(Submitted {
            item,
            task: Some(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryKnowledgeStore;
    use async_trait::async_trait;
    use secondbrain_core::error::ProviderError;
    use secondbrain_core::provider::{ByteStream, ProviderResponse};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replies with a fixed completion and records every request.
    struct MockProvider {
        reply: Result<String, ProviderError>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl MockProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.into()),
                requests: Mutex::new(vec![]),
            })
        }

        fn failing() -> Arc<Self> {
            Self::failing_with(ProviderError::ApiError {
                status_code: 500,
                message: "boom".into(),
            })
        }

        fn failing_with(error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                requests: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.reply.clone().map(|content| ProviderResponse {
                content,
                model: "mock-model".into(),
            })
        }

        async fn stream_bytes(&self, _request: ProviderRequest) -> Result<ByteStream, ProviderError> {
            Err(ProviderError::NotConfigured("mock does not stream".into()))
        }
    }

    fn processor(
        store: Arc<InMemoryKnowledgeStore>,
        provider: Arc<MockProvider>,
        limits: IngestLimits,
    ) -> ContentProcessor {
        ContentProcessor::new(store, provider, "test-model", limits).unwrap()
    }

    fn request(modality: Modality) -> IngestRequest {
        IngestRequest {
            file_name: None,
            url: None,
            text: None,
            title: None,
            modality,
        }
    }

    #[test]
    fn validation_rules() {
        assert!(request(Modality::Web).validate().is_err());

        let mut text = request(Modality::Text);
        text.url = Some("https://example.com".into());
        assert!(text.validate().is_err());

        text.text = Some("an idea".into());
        assert!(text.validate().is_ok());

        let mut doc = request(Modality::Document);
        doc.text = Some("not a locator".into());
        assert!(doc.validate().is_err());
        doc.file_name = Some("notes.txt".into());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn request_uses_camel_case_file_name() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"fileName":"a.pdf","modality":"document"}"#).unwrap();
        assert_eq!(req.file_name.as_deref(), Some("a.pdf"));
        assert_eq!(req.modality, Modality::Document);
    }

    #[tokio::test]
    async fn text_is_stored_completed_without_background_work() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("unused");
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(processor(store.clone(), provider.clone(), IngestLimits::default())),
        );

        let mut req = request(Modality::Text);
        req.text = Some("Remember to water the ferns".into());
        req.title = Some("Plants".into());
        let submitted = ingestor.submit(req).await.unwrap();

        assert!(submitted.task.is_none());
        assert_eq!(submitted.item.status, ItemStatus::Completed);
        assert_eq!(submitted.item.title, "Plants");
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submitted_items_are_stamped_with_capture_time() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(processor(
                store.clone(),
                MockProvider::replying("unused"),
                IngestLimits::default(),
            )),
        );

        let before = Utc::now();
        let mut note = request(Modality::Text);
        note.text = Some("dentist on tuesday".into());
        note.title = Some("Dentist".into());
        let note = ingestor.submit(note).await.unwrap().item;

        let mut clip = request(Modality::Audio);
        clip.file_name = Some("memo.m4a".into());
        let clip = ingestor.submit(clip).await.unwrap().item;

        for item in [note, clip] {
            let stored = store.get(&item.id).await.unwrap().unwrap();
            let at = stored.source_timestamp.expect("capture time recorded");
            assert!(at >= before && at <= Utc::now());
        }
    }

    #[tokio::test]
    async fn audio_gets_placeholder_in_background() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(processor(
                store.clone(),
                MockProvider::replying("unused"),
                IngestLimits::default(),
            )),
        );

        let mut req = request(Modality::Audio);
        req.file_name = Some("memo.m4a".into());
        let submitted = ingestor.submit(req).await.unwrap();
        assert_eq!(submitted.item.status, ItemStatus::Pending);
        assert_eq!(submitted.item.title, "memo.m4a");

        submitted.task.unwrap().await.unwrap();
        let stored = store.get(&submitted.item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Completed);
        assert_eq!(stored.processed_content.as_deref(), Some(AUDIO_PLACEHOLDER));
    }

    #[tokio::test]
    async fn document_is_summarized_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("minutes.txt");
        std::fs::write(&file, "Meeting minutes: ship v2 on Friday").unwrap();

        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("Summary: v2 ships Friday");
        let item = store
            .insert(NewKnowledgeItem::pending(
                "minutes",
                Modality::Document,
                file.display().to_string(),
            ))
            .await
            .unwrap();

        processor(store.clone(), provider.clone(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some("Summary: v2 ships Friday"));

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "test-model");
        assert!(requests[0].messages[1].content.contains("ship v2 on Friday"));
    }

    #[tokio::test]
    async fn document_falls_back_to_raw_text_when_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("long.txt");
        std::fs::write(&file, "x".repeat(200)).unwrap();

        let store = Arc::new(InMemoryKnowledgeStore::new());
        let limits = IngestLimits {
            document_fallback_chars: 50,
            ..IngestLimits::default()
        };
        let item = store
            .insert(NewKnowledgeItem::pending(
                "long",
                Modality::Document,
                file.display().to_string(),
            ))
            .await
            .unwrap();

        processor(store.clone(), MockProvider::failing(), limits)
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn missing_document_records_failure_note() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let item = store
            .insert(NewKnowledgeItem::pending(
                "gone",
                Modality::Document,
                "/definitely/not/here.txt",
            ))
            .await
            .unwrap();

        processor(store.clone(), MockProvider::replying("unused"), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Completed);
        assert_eq!(stored.processed_content.as_deref(), Some(DOCUMENT_FAILED));
    }

    #[tokio::test]
    async fn web_page_is_fetched_and_summarized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Octopuses have three hearts."))
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("Octopus anatomy facts");
        let item = store
            .insert(NewKnowledgeItem::pending(url.clone(), Modality::Web, url.clone()))
            .await
            .unwrap();

        processor(store.clone(), provider.clone(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some("Octopus anatomy facts"));
        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].messages[1].content.starts_with(&format!("Webpage content from {url}")));
    }

    #[tokio::test]
    async fn web_fetch_error_records_failure_note() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let item = store
            .insert(NewKnowledgeItem::pending("page", Modality::Web, url))
            .await
            .unwrap();

        processor(store.clone(), MockProvider::replying("unused"), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some(WEB_FAILED));
    }

    #[tokio::test]
    async fn image_is_sent_as_image_part() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("A grey cat on a windowsill");
        let item = store
            .insert(NewKnowledgeItem::pending(
                "photo",
                Modality::Image,
                "https://cdn.example.com/cat.png",
            ))
            .await
            .unwrap();

        processor(store.clone(), provider.clone(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some("A grey cat on a windowsill"));

        let requests = provider.requests.lock().unwrap();
        let turn = &requests[0].messages[0];
        assert_eq!(turn.content, IMAGE_INSTRUCTION);
        assert_eq!(turn.images, vec!["https://cdn.example.com/cat.png".to_string()]);
    }

    #[tokio::test]
    async fn local_image_is_inlined_as_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("receipt.PNG");
        std::fs::write(&file, b"\x89PNG").unwrap();

        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("A receipt");
        let item = store
            .insert(NewKnowledgeItem::pending(
                "receipt",
                Modality::Image,
                file.display().to_string(),
            ))
            .await
            .unwrap();

        processor(store.clone(), provider.clone(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].images, vec!["data:image/png;base64,iVBORw==".to_string()]);
    }

    #[tokio::test]
    async fn unreadable_image_records_failure_note() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = MockProvider::replying("unused");
        let item = store
            .insert(NewKnowledgeItem::pending("gone", Modality::Image, "/no/such/photo.jpg"))
            .await
            .unwrap();

        processor(store.clone(), provider.clone(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some(IMAGE_FAILED));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_network_error_is_failure_note() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let item = store
            .insert(NewKnowledgeItem::pending(
                "photo",
                Modality::Image,
                "https://cdn.example.com/cat.png",
            ))
            .await
            .unwrap();

        processor(
            store.clone(),
            MockProvider::failing_with(ProviderError::Network("connection refused".into())),
            IngestLimits::default(),
        )
        .process(&item)
        .await
        .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some(IMAGE_FAILED));
    }

    #[tokio::test]
    async fn image_description_failure_is_pending_note() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let item = store
            .insert(NewKnowledgeItem::pending(
                "photo",
                Modality::Image,
                "https://cdn.example.com/cat.png",
            ))
            .await
            .unwrap();

        processor(store.clone(), MockProvider::failing(), IngestLimits::default())
            .process(&item)
            .await
            .unwrap();

        let stored = store.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_content.as_deref(), Some(IMAGE_PENDING));
    }

    #[tokio::test]
    async fn deleted_item_fails_processing() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let item = store
            .insert(NewKnowledgeItem::pending("clip", Modality::Audio, "clip.mp3"))
            .await
            .unwrap();
        store.delete(&item.id).await.unwrap();

        let err = processor(store.clone(), MockProvider::replying("x"), IngestLimits::default())
            .process(&item)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(StoreError::NotFound(_))));
    }
}
