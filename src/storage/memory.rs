//! In-process snippet store (`memory:`), for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{NewSnippet, Snippet, SnippetId, SnippetStore, StoreError};

/// Snippets kept in a concurrent map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snippets: DashMap<SnippetId, Snippet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

#[async_trait]
impl SnippetStore for MemoryStore {
    async fn insert(&self, id: SnippetId, snippet: NewSnippet) -> Result<Snippet, StoreError> {
        match self.snippets.entry(id.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().has_content(&snippet) {
                    Ok(existing.get().clone())
                } else {
                    Err(StoreError::Collision(id))
                }
            }
            Entry::Vacant(slot) => {
                let stored = Snippet::from_new(id, snippet, Utc::now());
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn get(&self, id: &SnippetId) -> Result<Option<Snippet>, StoreError> {
        Ok(self.snippets.get(id).map(|entry| entry.value().clone()))
    }
}
