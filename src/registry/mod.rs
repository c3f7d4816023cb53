// src/registry/mod.rs
//! Persistence seams for identities and the title dictionary, plus the
//! in-process snapshot the resolver scans.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::honorifics::dictionary::TitleDictionaryDocument;
use crate::models::core::IdentityRecord;

pub use memory::InMemoryRegistry;
pub use postgres::PgRegistryStore;

/// Identity persistence. There is deliberately no delete.
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    /// Every identity, in creation order.
    async fn load_all_identities(&self) -> Result<Vec<IdentityRecord>>;

    async fn get_identity(&self, id: &str) -> Result<Option<IdentityRecord>>;

    /// Fails if an identity with the same id already exists.
    async fn insert_identity(&self, identity: &IdentityRecord) -> Result<()>;

    /// Overwrites only the given top-level fields.
    async fn update_identity_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait DictionaryStore {
    async fn load_dictionary(&self, key: &str) -> Result<Option<TitleDictionaryDocument>>;

    async fn save_dictionary(&self, key: &str, document: &TitleDictionaryDocument) -> Result<()>;
}

/// Creation-ordered view of the registry held for the length of a run.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    identities: Vec<IdentityRecord>,
    positions: HashMap<String, usize>,
}

impl RegistrySnapshot {
    pub fn new(identities: Vec<IdentityRecord>) -> Self {
        let positions = identities
            .iter()
            .enumerate()
            .map(|(idx, identity)| (identity.id.clone(), idx))
            .collect();
        Self {
            identities,
            positions,
        }
    }

    pub fn identities(&self) -> &[IdentityRecord] {
        &self.identities
    }

    pub fn get(&self, idx: usize) -> Option<&IdentityRecord> {
        self.identities.get(idx)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&IdentityRecord> {
        self.positions.get(id).and_then(|idx| self.identities.get(*idx))
    }

    /// Replaces the identity at `idx`, keeping its position.
    pub fn replace(&mut self, idx: usize, identity: IdentityRecord) {
        if let Some(slot) = self.identities.get_mut(idx) {
            *slot = identity;
        }
    }

    pub fn push(&mut self, identity: IdentityRecord) {
        self.positions
            .insert(identity.id.clone(), self.identities.len());
        self.identities.push(identity);
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
