// src/registry/postgres.rs
//! Identities and the title dictionary stored as JSONB documents.
use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde_json::{Map, Value};
use tokio_postgres::types::Json;

use crate::honorifics::dictionary::TitleDictionaryDocument;
use crate::models::core::IdentityRecord;
use crate::registry::{DictionaryStore, IdentityStore};
use crate::utils::db_connect::PgPool;

const SCHEMA_SQL: &str = "
    CREATE SCHEMA IF NOT EXISTS registry;

    CREATE TABLE IF NOT EXISTS registry.identity (
        id TEXT PRIMARY KEY,
        created_seq BIGSERIAL NOT NULL,
        canonical_name TEXT NOT NULL,
        document JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS identity_created_seq_idx
        ON registry.identity (created_seq);

    CREATE TABLE IF NOT EXISTS registry.title_dictionary (
        id TEXT PRIMARY KEY,
        document JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
";

#[derive(Clone)]
pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for ensure_schema")?;
        conn.batch_execute(SCHEMA_SQL)
            .await
            .context("Failed to create registry schema")?;
        info!("Registry schema is in place");
        Ok(())
    }
}

impl IdentityStore for PgRegistryStore {
    async fn load_all_identities(&self) -> Result<Vec<IdentityRecord>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for load_all_identities")?;
        let rows = conn
            .query(
                "SELECT document FROM registry.identity ORDER BY created_seq",
                &[],
            )
            .await
            .context("Failed to load identities")?;

        let identities = rows
            .iter()
            .map(|row| -> Result<IdentityRecord> {
                let Json(identity): Json<IdentityRecord> = row
                    .try_get("document")
                    .context("Failed to decode identity document")?;
                Ok(identity)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} identities from registry", identities.len());
        Ok(identities)
    }

    async fn get_identity(&self, id: &str) -> Result<Option<IdentityRecord>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for get_identity")?;
        let row = conn
            .query_opt(
                "SELECT document FROM registry.identity WHERE id = $1",
                &[&id],
            )
            .await
            .with_context(|| format!("Failed to fetch identity {}", id))?;

        row.map(|row| -> Result<IdentityRecord> {
            let Json(identity): Json<IdentityRecord> = row
                .try_get("document")
                .with_context(|| format!("Failed to decode identity {}", id))?;
            Ok(identity)
        })
        .transpose()
    }

    async fn insert_identity(&self, identity: &IdentityRecord) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for insert_identity")?;
        conn.execute(
            "INSERT INTO registry.identity (id, canonical_name, document) VALUES ($1, $2, $3)",
            &[&identity.id, &identity.canonical_name, &Json(identity)],
        )
        .await
        .with_context(|| format!("Failed to insert identity {}", identity.id))?;
        Ok(())
    }

    async fn update_identity_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for update_identity_fields")?;
        let patch = Value::Object(fields.clone());
        let updated = conn
            .execute(
                "UPDATE registry.identity
                 SET document = document || $2::jsonb, updated_at = NOW()
                 WHERE id = $1",
                &[&id, &patch],
            )
            .await
            .with_context(|| format!("Failed to update identity {}", id))?;
        if updated == 0 {
            bail!("Identity {} not found for update", id);
        }
        Ok(())
    }
}

impl DictionaryStore for PgRegistryStore {
    async fn load_dictionary(&self, key: &str) -> Result<Option<TitleDictionaryDocument>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for load_dictionary")?;
        let row = conn
            .query_opt(
                "SELECT document FROM registry.title_dictionary WHERE id = $1",
                &[&key],
            )
            .await
            .with_context(|| format!("Failed to fetch title dictionary '{}'", key))?;

        row.map(|row| -> Result<TitleDictionaryDocument> {
            let Json(document): Json<TitleDictionaryDocument> = row
                .try_get("document")
                .context("Failed to decode title dictionary document")?;
            Ok(document)
        })
        .transpose()
    }

    async fn save_dictionary(&self, key: &str, document: &TitleDictionaryDocument) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for save_dictionary")?;
        conn.execute(
            "INSERT INTO registry.title_dictionary (id, document) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()",
            &[&key, &Json(document)],
        )
        .await
        .with_context(|| format!("Failed to save title dictionary '{}'", key))?;
        info!(
            "Saved title dictionary '{}' ({} honorifics)",
            key, document.total_honorifics
        );
        Ok(())
    }
}
