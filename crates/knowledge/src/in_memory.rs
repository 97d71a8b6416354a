//! In-memory knowledge store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use secondbrain_core::error::StoreError;
use secondbrain_core::knowledge::{
    ExcerptQuery, ItemStatus, KnowledgeItem, KnowledgeStore, NewKnowledgeItem,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A knowledge store that keeps items in a Vec, in insertion order.
pub struct InMemoryKnowledgeStore {
    items: Arc<RwLock<Vec<KnowledgeItem>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Term-frequency score of `content` against lowercase `terms`.
fn score(content: &str, terms: &[String]) -> usize {
    let content = content.to_lowercase();
    terms.iter().map(|t| content.matches(t.as_str()).count()).sum()
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, item: NewKnowledgeItem) -> Result<KnowledgeItem, StoreError> {
        let record = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            title: item.title,
            modality: item.modality,
            original_content: item.original_content,
            processed_content: item.processed_content,
            status: item.status,
            source_timestamp: item.source_timestamp,
            created_at: Utc::now(),
        };
        self.items.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.iter().find(|i| i.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<KnowledgeItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.iter().rev().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut items = self.items.write().await;
        let len_before = items.len();
        items.retain(|i| i.id != id);
        Ok(items.len() < len_before)
    }

    async fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.status = status;
        Ok(())
    }

    async fn complete(&self, id: &str, processed_content: &str) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.processed_content = Some(processed_content.to_string());
        item.status = ItemStatus::Completed;
        Ok(())
    }

    async fn search_completed(&self, query: ExcerptQuery) -> Result<Vec<KnowledgeItem>, StoreError> {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let items = self.items.read().await;
        let mut scored: Vec<(usize, &KnowledgeItem)> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .filter_map(|i| {
                let s = score(i.processed_content.as_deref()?, &terms);
                (s > 0).then_some((s, i))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(_, i)| i.clone())
            .collect())
    }
}
