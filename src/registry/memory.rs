// src/registry/memory.rs
use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::honorifics::dictionary::TitleDictionaryDocument;
use crate::models::core::IdentityRecord;
use crate::registry::{DictionaryStore, IdentityStore};

/// Process-local store used by tests and `--memory` runs.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    identities: Mutex<Vec<IdentityRecord>>,
    dictionaries: Mutex<HashMap<String, TitleDictionaryDocument>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_dictionary(&self, key: &str, document: TitleDictionaryDocument) {
        self.dictionaries
            .lock()
            .await
            .insert(key.to_string(), document);
    }

    pub async fn identities(&self) -> Vec<IdentityRecord> {
        self.identities.lock().await.clone()
    }
}

impl IdentityStore for InMemoryRegistry {
    async fn load_all_identities(&self) -> Result<Vec<IdentityRecord>> {
        Ok(self.identities.lock().await.clone())
    }

    async fn get_identity(&self, id: &str) -> Result<Option<IdentityRecord>> {
        Ok(self
            .identities
            .lock()
            .await
            .iter()
            .find(|identity| identity.id == id)
            .cloned())
    }

    async fn insert_identity(&self, identity: &IdentityRecord) -> Result<()> {
        let mut identities = self.identities.lock().await;
        if identities.iter().any(|existing| existing.id == identity.id) {
            bail!("Identity {} already exists", identity.id);
        }
        identities.push(identity.clone());
        Ok(())
    }

    async fn update_identity_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        let mut identities = self.identities.lock().await;
        let slot = identities
            .iter_mut()
            .find(|identity| identity.id == id)
            .ok_or_else(|| anyhow!("Identity {} not found for update", id))?;

        let mut document = match serde_json::to_value(&*slot)
            .with_context(|| format!("Failed to serialize identity {}", id))?
        {
            Value::Object(map) => map,
            _ => bail!("Identity {} did not serialize to an object", id),
        };
        for (field, value) in fields {
            document.insert(field.clone(), value.clone());
        }

        *slot = serde_json::from_value(Value::Object(document))
            .with_context(|| format!("Patched identity {} no longer deserializes", id))?;
        Ok(())
    }
}

impl DictionaryStore for InMemoryRegistry {
    async fn load_dictionary(&self, key: &str) -> Result<Option<TitleDictionaryDocument>> {
        Ok(self.dictionaries.lock().await.get(key).cloned())
    }

    async fn save_dictionary(&self, key: &str, document: &TitleDictionaryDocument) -> Result<()> {
        self.dictionaries
            .lock()
            .await
            .insert(key.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::history::{consolidation_patch, create_identity, TermObservation};
    use crate::consolidation::term::build_term_entry;
    use crate::honorifics::dictionary::TitleDictionary;
    use crate::models::core::{ExtractionMethod, RawObservation};
    use crate::models::stats_models::ExtractionStats;
    use chrono::Utc;

    fn identity(name: &str, term: u32) -> IdentityRecord {
        let raw = RawObservation {
            display_name: name.to_string(),
            constituency_text: "P045 Bagan".to_string(),
            party_text: "PH".to_string(),
            state: "Pulau Pinang".to_string(),
            term,
        };
        let observation = TermObservation {
            entry: build_term_entry(&raw, 15, 100.0, Utc::now()),
            titles: Vec::new(),
            extraction_method: ExtractionMethod::Dictionary,
        };
        create_identity(&raw, name, &observation, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = InMemoryRegistry::new();
        let record = identity("Lim Guan Eng", 14);

        store.insert_identity(&record).await.unwrap();
        assert!(store.insert_identity(&record).await.is_err());
        assert_eq!(store.load_all_identities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_preserves_creation_order() {
        let store = InMemoryRegistry::new();
        let first = identity("Lim Guan Eng", 14);
        let second = identity("Anwar Ibrahim", 14);
        store.insert_identity(&first).await.unwrap();
        store.insert_identity(&second).await.unwrap();

        let loaded = store.load_all_identities().await.unwrap();
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[1].id, second.id);
        assert_eq!(
            store.get_identity(&second.id).await.unwrap().map(|i| i.canonical_name),
            Some("Anwar Ibrahim".to_string())
        );
        assert!(store.get_identity("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_field_update_leaves_other_fields() {
        let store = InMemoryRegistry::new();
        let original = identity("Lim Guan Eng", 14);
        store.insert_identity(&original).await.unwrap();

        let mut changed = original.clone();
        changed.current_term = 15;
        changed.canonical_name = "Should Not Persist".to_string();
        let patch = consolidation_patch(&changed).unwrap();
        store.update_identity_fields(&original.id, &patch).await.unwrap();

        let stored = store.get_identity(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.current_term, 15);
        assert_eq!(stored.canonical_name, "Lim Guan Eng");

        assert!(store.update_identity_fields("missing", &patch).await.is_err());
    }

    #[tokio::test]
    async fn test_dictionary_round_trip() {
        let store = InMemoryRegistry::new();
        assert!(store.load_dictionary("honorific_dictionary").await.unwrap().is_none());

        let document = TitleDictionary::seed().to_document(Utc::now(), 0, ExtractionStats::default());
        store.save_dictionary("honorific_dictionary", &document).await.unwrap();
        assert_eq!(
            store.load_dictionary("honorific_dictionary").await.unwrap(),
            Some(document)
        );
    }
}
