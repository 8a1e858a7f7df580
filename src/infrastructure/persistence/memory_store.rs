//! In-memory document store
//!
//! Clones share the same map, so two sessions built from clones of one store
//! see each other's writes the way two processes would see a shared server.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::application::ports::outbound::{DocumentKey, DocumentStorePort, PersistenceError, Scope};
use crate::domain::value_objects::StoryId;

type DocumentMap = HashMap<(String, String), Value>;

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<DocumentMap>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across every collection
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStorePort for InMemoryDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), PersistenceError> {
        self.documents
            .write()
            .await
            .insert((collection.to_string(), key.to_string()), document);
        Ok(())
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<Value>, PersistenceError> {
        Ok(self
            .documents
            .read()
            .await
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    async fn list(
        &self,
        collection: &str,
        story: &StoryId,
        scope: Scope,
    ) -> Result<Vec<Value>, PersistenceError> {
        let prefix = DocumentKey::prefix(story, scope);
        let documents = self.documents.read().await;
        let mut matching: Vec<(&String, &Value)> = documents
            .iter()
            .filter(|((c, k), _)| c == collection && k.starts_with(&prefix))
            .map(|((_, k), v)| (k, v))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(b.0));
        Ok(matching.into_iter().map(|(_, v)| v.clone()).collect())
    }
}
