//! Document store port - keyed upsert/fetch of JSON documents
//!
//! Keys are `(story, scope, id)`. The store is not expected to support
//! queries beyond key lookup and listing a `(story, scope)` prefix; any
//! filtering happens in-process.

use async_trait::async_trait;

use crate::domain::value_objects::StoryId;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Story-wide or chapter-local namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Chapter(u32),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Chapter(n) => write!(f, "chapter-{:04}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub story: StoryId,
    pub scope: Scope,
    pub id: String,
}

impl DocumentKey {
    pub fn new(story: StoryId, scope: Scope, id: impl Into<String>) -> Self {
        Self {
            story,
            scope,
            id: id.into(),
        }
    }

    pub fn global(story: StoryId, id: impl Into<String>) -> Self {
        Self::new(story, Scope::Global, id)
    }

    /// Prefix shared by every key in `(story, scope)`
    pub fn prefix(story: &StoryId, scope: Scope) -> String {
        format!("{}/{}/", story, scope)
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.story, self.scope, self.id)
    }
}

#[async_trait]
pub trait DocumentStorePort: Send + Sync {
    async fn upsert(
        &self,
        collection: &str,
        key: &DocumentKey,
        document: serde_json::Value,
    ) -> Result<(), PersistenceError>;

    async fn fetch(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<serde_json::Value>, PersistenceError>;

    /// Every document under `(story, scope)`, in key order
    async fn list(
        &self,
        collection: &str,
        story: &StoryId,
        scope: Scope,
    ) -> Result<Vec<serde_json::Value>, PersistenceError>;
}
