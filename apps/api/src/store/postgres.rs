use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::store::{apply_updates, Document, DocumentStore, Fields, FieldUpdate, StoreError};

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    version: i64,
    fields: Json<Fields>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            version: row.version.max(0) as u64,
            fields: row.fields.0,
        }
    }
}

/// Documents stored as `jsonb` rows in the `documents` table (see `db::ensure_schema`).
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, version, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<u64, StoreError> {
        let version: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO documents (collection, id, fields, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (collection, id) DO UPDATE
                SET fields = EXCLUDED.fields,
                    version = documents.version + 1,
                    updated_at = now()
            RETURNING version
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .fetch_one(&self.pool)
        .await?;

        debug!("Wrote {collection}/{id} at version {version}");
        Ok(version.max(0) as u64)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent increments on the same document.
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, version, fields FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut document = row.map(Document::from).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        if let Some(expected) = expected_version {
            if document.version != expected {
                return Err(StoreError::VersionConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: document.version,
                });
            }
        }

        apply_updates(collection, id, &mut document.fields, updates)?;
        let next_version = document.version + 1;

        sqlx::query(
            r#"
            UPDATE documents
            SET fields = $3, version = $4, updated_at = now()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&document.fields))
        .bind(next_version as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Updated {collection}/{id} to version {next_version}");
        Ok(next_version)
    }
}
