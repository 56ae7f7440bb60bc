//! Persistence contract consumed by the auto-save coordinator.
//!
//! The real store is a remote API that upserts any subset of an article's
//! fields. The coordinator treats it as opaque: no idempotency is assumed,
//! and it never has more than one save in flight per document.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use resh_common::StoreError;
use serde::{Deserialize, Serialize};

use crate::target::{DocumentId, EditingTarget, LanguageCode};

/// Change to an article's featured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImageChange {
    Set { media_id: u64 },
    Clear,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ImageChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u64>>,
}

impl DocumentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// What the store reports back after a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageCode>,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

/// The persistence collaborator.
pub trait DocumentStore {
    fn save(
        &self,
        target: &EditingTarget,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<StoredDocument, StoreError>> + Send;
}

impl<S: DocumentStore + Sync> DocumentStore for &S {
    fn save(
        &self,
        target: &EditingTarget,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<StoredDocument, StoreError>> + Send {
        (**self).save(target, patch)
    }
}

/// Fields of one stored article (or one translation of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFields {
    pub content: String,
    pub title: String,
    pub keyword: String,
    pub meta_description: String,
    pub featured_image: Option<u64>,
    pub categories: Vec<u64>,
    pub revision: u64,
}

impl StoredFields {
    pub fn apply(&mut self, patch: DocumentPatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(keyword) = patch.keyword {
            self.keyword = keyword;
        }
        if let Some(description) = patch.meta_description {
            self.meta_description = description;
        }
        match patch.featured_image {
            Some(ImageChange::Set { media_id }) => self.featured_image = Some(media_id),
            Some(ImageChange::Clear) => self.featured_image = None,
            None => {}
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        self.revision += 1;
    }
}

/// In-process store, keyed by target. Used by tests and the CLI replay.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<EditingTarget, StoredFields>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &EditingTarget) -> Option<StoredFields> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(target).cloned())
    }

    pub fn snapshot(&self) -> HashMap<EditingTarget, StoredFields> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn apply(
        &self,
        target: &EditingTarget,
        patch: DocumentPatch,
    ) -> Result<StoredDocument, StoreError> {
        let mut docs = self
            .documents
            .lock()
            .map_err(|_| StoreError::Transport("store lock poisoned".into()))?;
        let fields = docs.entry(target.clone()).or_default();
        fields.apply(patch);
        Ok(StoredDocument {
            id: target.document().clone(),
            language: target.language().cloned(),
            revision: fields.revision,
            updated_at: Utc::now(),
        })
    }
}

impl DocumentStore for MemoryStore {
    async fn save(
        &self,
        target: &EditingTarget,
        patch: DocumentPatch,
    ) -> Result<StoredDocument, StoreError> {
        self.apply(target, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> EditingTarget {
        EditingTarget::original(DocumentId::new("doc-1").unwrap())
    }

    #[test]
    fn patches_only_touch_present_fields() {
        let mut fields = StoredFields {
            title: "Kept".into(),
            featured_image: Some(9),
            ..StoredFields::default()
        };
        fields.apply(DocumentPatch::content("<p>new</p>"));
        assert_eq!(fields.title, "Kept");
        assert_eq!(fields.content, "<p>new</p>");
        assert_eq!(fields.featured_image, Some(9));
        assert_eq!(fields.revision, 1);

        fields.apply(DocumentPatch {
            featured_image: Some(ImageChange::Clear),
            ..DocumentPatch::default()
        });
        assert_eq!(fields.featured_image, None);
        assert_eq!(fields.content, "<p>new</p>");
    }

    #[test]
    fn empty_patch_serialises_to_empty_object() {
        assert!(DocumentPatch::default().is_empty());
        assert_eq!(serde_json::to_string(&DocumentPatch::default()).unwrap(), "{}");
        let patch = DocumentPatch {
            featured_image: Some(ImageChange::Set { media_id: 7 }),
            ..DocumentPatch::default()
        };
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"featured_image":{"op":"set","media_id":7}}"#
        );
    }

    #[tokio::test]
    async fn memory_store_keeps_translations_apart() {
        let store = MemoryStore::new();
        let original = target();
        let spanish = EditingTarget::translation(
            original.document().clone(),
            LanguageCode::new("es").unwrap(),
        );

        store
            .save(&original, DocumentPatch::content("<p>hello</p>"))
            .await
            .unwrap();
        let saved = store
            .save(&spanish, DocumentPatch::content("<p>hola</p>"))
            .await
            .unwrap();

        assert_eq!(saved.language.unwrap().as_str(), "es");
        assert_eq!(store.get(&original).unwrap().content, "<p>hello</p>");
        assert_eq!(store.get(&spanish).unwrap().content, "<p>hola</p>");
    }
}
