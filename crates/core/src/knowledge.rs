//! Knowledge store trait: the user's normalized, searchable content.
//!
//! Items arrive through ingestion in one of several modalities and become
//! searchable once their `processed_content` is filled in and their status is
//! `completed`. Chat retrieval only ever reads completed items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// The kind of source a knowledge item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Document,
    Audio,
    Web,
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Web => "web",
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "audio" => Ok(Self::Audio),
            "web" => Ok(Self::Web),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown modality '{other}'")),
        }
    }
}

/// Processing lifecycle of a knowledge item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A stored knowledge item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique ID
    pub id: String,

    /// Display title
    pub title: String,

    pub modality: Modality,

    /// Raw text, or a locator (file path / URL) for non-text modalities
    pub original_content: String,

    /// Normalized text used for retrieval
    #[serde(default)]
    pub processed_content: Option<String>,

    pub status: ItemStatus,

    /// When the underlying content was captured, if known
    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a knowledge item.
#[derive(Debug, Clone)]
pub struct NewKnowledgeItem {
    pub title: String,
    pub modality: Modality,
    pub original_content: String,
    pub processed_content: Option<String>,
    pub status: ItemStatus,
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl NewKnowledgeItem {
    /// A pending item awaiting background processing.
    pub fn pending(
        title: impl Into<String>,
        modality: Modality,
        original_content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            modality,
            original_content: original_content.into(),
            processed_content: None,
            status: ItemStatus::Pending,
            source_timestamp: None,
        }
    }

    /// A free-text item, searchable immediately.
    pub fn text(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            title: title.into(),
            modality: Modality::Text,
            original_content: text.clone(),
            processed_content: Some(text),
            status: ItemStatus::Completed,
            source_timestamp: None,
        }
    }

    /// Record when the content was captured.
    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(at);
        self
    }
}

/// A bounded slice of a completed item, produced fresh for each chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeExcerpt {
    pub source_id: String,
    pub title: String,
    pub modality: Modality,
    /// The item's source timestamp, when one was recorded
    pub captured_at: Option<DateTime<Utc>>,
    pub excerpt: String,
}

impl KnowledgeExcerpt {
    /// Build an excerpt from a completed item, keeping at most `max_chars`
    /// characters of its processed content.
    pub fn from_item(item: &KnowledgeItem, max_chars: usize) -> Self {
        let text = item.processed_content.as_deref().unwrap_or_default();
        Self {
            source_id: item.id.clone(),
            title: item.title.clone(),
            modality: item.modality,
            captured_at: item.source_timestamp,
            excerpt: truncate_chars(text, max_chars).to_string(),
        }
    }
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A relevance search over completed items.
#[derive(Debug, Clone)]
pub struct ExcerptQuery {
    /// Search terms; a match on any term qualifies an item
    pub terms: Vec<String>,

    /// Maximum number of results
    pub limit: usize,
}

impl ExcerptQuery {
    /// Split free text into whitespace-separated terms.
    pub fn from_text(text: &str, limit: usize) -> Self {
        Self {
            terms: text.split_whitespace().map(str::to_string).collect(),
            limit,
        }
    }
}

/// The core KnowledgeStore trait.
///
/// Implementations: SQLite with FTS5, in-memory (for testing).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Create an item and return the stored record.
    async fn insert(&self, item: NewKnowledgeItem) -> Result<KnowledgeItem, StoreError>;

    /// Get an item by ID.
    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>, StoreError>;

    /// All items, newest first.
    async fn list(&self) -> Result<Vec<KnowledgeItem>, StoreError>;

    /// Delete an item by ID. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Move an item to a new status.
    async fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError>;

    /// Store processed content and mark the item completed.
    async fn complete(&self, id: &str, processed_content: &str) -> Result<(), StoreError>;

    /// Completed items matching any query term, most relevant first.
    ///
    /// Ties are broken by insertion order so results are deterministic.
    async fn search_completed(
        &self,
        query: ExcerptQuery,
    ) -> Result<Vec<KnowledgeItem>, StoreError>;
}
