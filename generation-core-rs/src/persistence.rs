//! Persistence collaborator for generated content
//!
//! The regeneration controller stores each attempt before scoring when a
//! store is configured. Scoring never depends on the store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::quality::GeneratedContent;

/// Identifier assigned to stored content
pub type ContentId = String;

/// Storage for generated content
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persist `content` and return its id
    async fn store_content(&self, content: &GeneratedContent) -> anyhow::Result<ContentId>;
}

/// Id used when content is not (or could not be) persisted
pub fn local_content_id() -> ContentId {
    format!("local-{}", uuid::Uuid::new_v4())
}

/// A stored content entry
#[derive(Debug, Clone, Serialize)]
pub struct StoredContent {
    pub id: ContentId,
    pub content: GeneratedContent,
    pub stored_at: DateTime<Utc>,
}

/// Process-local content store
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    entries: RwLock<HashMap<ContentId, StoredContent>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<StoredContent> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn store_content(&self, content: &GeneratedContent) -> anyhow::Result<ContentId> {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = StoredContent {
            id: id.clone(),
            content: content.clone(),
            stored_at: Utc::now(),
        };
        self.entries.write().await.insert(id.clone(), entry);
        debug!(content_id = %id, content_type = %content.content_type(), "Content stored");
        Ok(id)
    }
}
