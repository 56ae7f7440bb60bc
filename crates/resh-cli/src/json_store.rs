//! Document store backed by a single JSON file, for `resh replay`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use resh_editor_core::store::StoredFields;
use resh_editor_core::{DocumentPatch, DocumentStore, EditingTarget, StoreError, StoredDocument};

/// Every save rewrites the whole file. Documents are keyed by target, so the
/// original and each translation get their own entry.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn read(&self) -> Result<BTreeMap<String, StoredFields>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::Rejected(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Transport(e.to_string())),
        }
    }
}

impl DocumentStore for JsonFileStore {
    async fn save(
        &self,
        target: &EditingTarget,
        patch: DocumentPatch,
    ) -> Result<StoredDocument, StoreError> {
        let mut documents = self.read().await?;
        let fields = documents.entry(target.to_string()).or_default();
        fields.apply(patch);
        let revision = fields.revision;

        let json = serde_json::to_string_pretty(&documents)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(StoredDocument {
            id: target.document().clone(),
            language: target.language().cloned(),
            revision,
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use resh_editor_core::{DocumentId, LanguageCode};

    use super::*;

    #[tokio::test]
    async fn saves_accumulate_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("docs.json"));
        let original = EditingTarget::original(DocumentId::new("post").unwrap());
        let spanish = EditingTarget::translation(
            DocumentId::new("post").unwrap(),
            LanguageCode::new("es").unwrap(),
        );

        store
            .save(&original, DocumentPatch::content("<p>hi</p>"))
            .await
            .unwrap();
        let saved = store
            .save(&original, DocumentPatch::content("<p>hi there</p>"))
            .await
            .unwrap();
        store
            .save(&spanish, DocumentPatch::content("<p>hola</p>"))
            .await
            .unwrap();

        assert_eq!(saved.revision, 2);
        let documents = store.read().await.unwrap();
        assert_eq!(documents["post"].content, "<p>hi there</p>");
        assert_eq!(documents["post [es]"].content, "<p>hola</p>");
    }
}
