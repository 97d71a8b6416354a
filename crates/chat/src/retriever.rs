//! Context retrieval over the knowledge store.

use secondbrain_config::RetrievalConfig;
use secondbrain_core::knowledge::{ExcerptQuery, KnowledgeExcerpt, KnowledgeStore};
use secondbrain_core::message::{ConversationTurn, latest_user_turn};
use std::sync::Arc;
use tracing::{debug, warn};

/// Finds excerpts relevant to the latest user turn.
pub struct ContextRetriever {
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
    excerpt_chars: usize,
}

impl ContextRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            top_k: config.top_k,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// At most `top_k` excerpts, most relevant first.
    ///
    /// Returns empty without querying the store when there is no user turn,
    /// and empty when the store fails.
    pub async fn retrieve(&self, turns: &[ConversationTurn]) -> Vec<KnowledgeExcerpt> {
        let Some(turn) = latest_user_turn(turns) else {
            debug!("No user turn; skipping retrieval");
            return Vec::new();
        };

        let query = ExcerptQuery::from_text(&turn.content, self.top_k);
        if query.terms.is_empty() {
            return Vec::new();
        }

        match self.store.search_completed(query).await {
            Ok(items) => items
                .iter()
                .take(self.top_k)
                .map(|item| KnowledgeExcerpt::from_item(item, self.excerpt_chars))
                .collect(),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Knowledge retrieval failed; continuing without context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use secondbrain_core::error::StoreError;
    use secondbrain_core::knowledge::{ItemStatus, KnowledgeItem, NewKnowledgeItem};
    use secondbrain_knowledge::InMemoryKnowledgeStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A store whose search always fails, counting how often it is asked.
    #[derive(Default)]
    struct BrokenStore {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn insert(&self, _item: NewKnowledgeItem) -> Result<KnowledgeItem, StoreError> {
            Err(StoreError::Storage("read-only".into()))
        }
        async fn get(&self, _id: &str) -> Result<Option<KnowledgeItem>, StoreError> {
            Ok(None)
        }
        async fn list(&self) -> Result<Vec<KnowledgeItem>, StoreError> {
            Ok(vec![])
        }
        async fn delete(&self, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn set_status(&self, id: &str, _status: ItemStatus) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.into()))
        }
        async fn complete(&self, id: &str, _c: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.into()))
        }
        async fn search_completed(&self, _q: ExcerptQuery) -> Result<Vec<KnowledgeItem>, StoreError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::QueryFailed("index corrupted".into()))
        }
    }

    fn config(top_k: usize, excerpt_chars: usize) -> RetrievalConfig {
        RetrievalConfig { top_k, excerpt_chars }
    }

    #[tokio::test]
    async fn no_user_turn_means_no_query() {
        let store = Arc::new(BrokenStore::default());
        let retriever = ContextRetriever::new(store.clone(), &RetrievalConfig::default());

        let excerpts = retriever
            .retrieve(&[ConversationTurn::assistant("How can I help?")])
            .await;
        assert!(excerpts.is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);

        assert!(retriever.retrieve(&[]).await.is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        let store = Arc::new(BrokenStore::default());
        let retriever = ContextRetriever::new(store.clone(), &RetrievalConfig::default());

        let excerpts = retriever
            .retrieve(&[ConversationTurn::user("what is in my notes")])
            .await;
        assert!(excerpts.is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uses_latest_user_turn() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store
            .insert(NewKnowledgeItem::text("Garden", "tomatoes need full sun"))
            .await
            .unwrap();
        store
            .insert(NewKnowledgeItem::text("Car", "oil change due in May"))
            .await
            .unwrap();

        let retriever = ContextRetriever::new(store, &RetrievalConfig::default());
        let excerpts = retriever
            .retrieve(&[
                ConversationTurn::user("tomatoes"),
                ConversationTurn::assistant("They like sun."),
                ConversationTurn::user("when is the oil change"),
            ])
            .await;

        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].title, "Car");
    }

    #[tokio::test]
    async fn bounds_count_and_length() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        for i in 0..8 {
            store
                .insert(NewKnowledgeItem::text(format!("n{i}"), format!("rust {}", "é".repeat(50))))
                .await
                .unwrap();
        }

        let retriever = ContextRetriever::new(store, &config(3, 10));
        let excerpts = retriever.retrieve(&[ConversationTurn::user("rust")]).await;

        assert_eq!(excerpts.len(), 3);
        for excerpt in &excerpts {
            assert_eq!(excerpt.excerpt.chars().count(), 10);
            assert!(excerpt.excerpt.starts_with("rust "));
        }
    }

    #[tokio::test]
    async fn whitespace_only_turn_skips_search() {
        let store = Arc::new(BrokenStore::default());
        let retriever = ContextRetriever::new(store.clone(), &RetrievalConfig::default());
        assert!(retriever.retrieve(&[ConversationTurn::user("   ")]).await.is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }
}
