//! Persistence Gateway - typed access to the document store for one story
//!
//! Every persisted entity goes through here. Store failures surface as
//! `StoryError::PersistenceUnavailable` naming the collection and key.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::ports::outbound::{DocumentKey, DocumentStorePort, Scope};
use crate::domain::errors::{StoryError, StoryResult};
use crate::domain::value_objects::StoryId;

/// Collection names
pub mod collections {
    pub const METADATA: &str = "metadata";
    pub const CHARACTERS: &str = "characters";
    pub const NAME_REGISTRY: &str = "name_registry";
    pub const STORY_ELEMENTS: &str = "story_elements";
    pub const REWINDS: &str = "rewinds";
    pub const BRANDS: &str = "brands";
}

#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn DocumentStorePort>,
    story: StoryId,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn DocumentStorePort>, story: StoryId) -> Self {
        Self { store, story }
    }

    pub fn story(&self) -> &StoryId {
        &self.story
    }

    pub fn key(&self, scope: Scope, id: impl Into<String>) -> DocumentKey {
        DocumentKey::new(self.story.clone(), scope, id)
    }

    #[instrument(skip(self, value), fields(story = %self.story))]
    pub async fn upsert<T: Serialize + Sync>(
        &self,
        collection: &str,
        scope: Scope,
        id: &str,
        value: &T,
    ) -> StoryResult<()> {
        let key = self.key(scope, id);
        let document = serde_json::to_value(value)
            .map_err(|e| unavailable("serializing", collection, &key, e))?;
        self.store
            .upsert(collection, &key, document)
            .await
            .map_err(|e| unavailable("writing", collection, &key, e))?;
        debug!(collection, key = %key, "Upserted document");
        Ok(())
    }

    #[instrument(skip(self), fields(story = %self.story))]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        scope: Scope,
        id: &str,
    ) -> StoryResult<Option<T>> {
        let key = self.key(scope, id);
        let document = self
            .store
            .fetch(collection, &key)
            .await
            .map_err(|e| unavailable("reading", collection, &key, e))?;
        match document {
            Some(document) => serde_json::from_value(document)
                .map(Some)
                .map_err(|e| unavailable("decoding", collection, &key, e)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(story = %self.story))]
    pub async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        scope: Scope,
    ) -> StoryResult<Vec<T>> {
        let prefix = DocumentKey::prefix(&self.story, scope);
        let documents = self
            .store
            .list(collection, &self.story, scope)
            .await
            .map_err(|e| unavailable("listing", collection, &prefix, e))?;
        documents
            .into_iter()
            .map(|document| {
                serde_json::from_value(document)
                    .map_err(|e| unavailable("decoding", collection, &prefix, e))
            })
            .collect()
    }
}

fn unavailable(
    operation: &str,
    collection: &str,
    key: &dyn std::fmt::Display,
    error: impl std::fmt::Display,
) -> StoryError {
    StoryError::PersistenceUnavailable {
        operation: format!("{} {} {}", operation, collection, key),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::outbound::PersistenceError;
    use crate::infrastructure::persistence::InMemoryDocumentStore;
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    struct DownStore;

    #[async_trait]
    impl DocumentStorePort for DownStore {
        async fn upsert(
            &self,
            _collection: &str,
            _key: &DocumentKey,
            _document: serde_json::Value,
        ) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("connection refused".into()))
        }

        async fn fetch(
            &self,
            _collection: &str,
            _key: &DocumentKey,
        ) -> Result<Option<serde_json::Value>, PersistenceError> {
            Err(PersistenceError::Unavailable("connection refused".into()))
        }

        async fn list(
            &self,
            _collection: &str,
            _story: &StoryId,
            _scope: Scope,
        ) -> Result<Vec<serde_json::Value>, PersistenceError> {
            Err(PersistenceError::Unavailable("connection refused".into()))
        }
    }

    fn story() -> StoryId {
        StoryId::parse("harbor").unwrap()
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let gateway = PersistenceGateway::new(Arc::new(InMemoryDocumentStore::new()), story());
        let note = Note {
            text: "hello".to_string(),
        };
        gateway
            .upsert(collections::METADATA, Scope::Global, "note", &note)
            .await
            .unwrap();

        let back: Option<Note> = gateway
            .fetch(collections::METADATA, Scope::Global, "note")
            .await
            .unwrap();
        assert_eq!(back, Some(note));

        let missing: Option<Note> = gateway
            .fetch(collections::METADATA, Scope::Global, "other")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_story_and_scope() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let harbor = PersistenceGateway::new(store.clone(), story());
        let other = PersistenceGateway::new(store, StoryId::parse("other").unwrap());

        for (scope, text) in [(Scope::Chapter(1), "a"), (Scope::Chapter(2), "b")] {
            harbor
                .upsert(collections::STORY_ELEMENTS, scope, text, &Note { text: text.into() })
                .await
                .unwrap();
        }
        other
            .upsert(
                collections::STORY_ELEMENTS,
                Scope::Chapter(1),
                "c",
                &Note { text: "c".into() },
            )
            .await
            .unwrap();

        let chapter_one: Vec<Note> = harbor
            .list(collections::STORY_ELEMENTS, Scope::Chapter(1))
            .await
            .unwrap();
        assert_eq!(chapter_one, vec![Note { text: "a".into() }]);
    }

    #[tokio::test]
    async fn test_store_failure_names_collection_and_key() {
        let gateway = PersistenceGateway::new(Arc::new(DownStore), story());
        let err = gateway
            .upsert(
                collections::CHARACTERS,
                Scope::Global,
                "jessie",
                &Note { text: "x".into() },
            )
            .await
            .unwrap_err();
        match err {
            StoryError::PersistenceUnavailable { operation, message } => {
                assert!(operation.contains("characters"));
                assert!(operation.contains("harbor/global/jessie"));
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
