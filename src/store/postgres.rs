//! Postgres-backed store. See `migrations/` for the schema.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Collection, RawDocument, Scope, Store, StoreError, Write};

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow { key: String, version: i64, owner: Option<String>, tag: Option<String>, body: serde_json::Value }

impl From<DocumentRow> for RawDocument {
    fn from(r: DocumentRow) -> Self {
        RawDocument { key: r.key, version: r.version, owner: r.owner, tag: r.tag, body: r.body }
    }
}

#[derive(Clone)]
pub struct PgStore { db: PgPool }

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    async fn apply(tx: &mut Transaction<'_, Postgres>, write: Write) -> Result<(), StoreError> {
        match write {
            Write::Put { collection, expected_version, document, lookups } => {
                let result = if expected_version == 0 {
                    sqlx::query("INSERT INTO documents (collection, key, version, owner, tag, body, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) ON CONFLICT (collection, key) DO NOTHING")
                        .bind(collection.as_str()).bind(&document.key).bind(document.version).bind(&document.owner).bind(&document.tag).bind(&document.body)
                        .execute(&mut **tx).await?
                } else {
                    sqlx::query("UPDATE documents SET version = $3, owner = $4, tag = $5, body = $6, updated_at = NOW() WHERE collection = $1 AND key = $2 AND version = $7")
                        .bind(collection.as_str()).bind(&document.key).bind(document.version).bind(&document.owner).bind(&document.tag).bind(&document.body).bind(expected_version)
                        .execute(&mut **tx).await?
                };
                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict { collection, key: document.key });
                }
                sqlx::query("DELETE FROM document_lookups WHERE collection = $1 AND key = $2")
                    .bind(collection.as_str()).bind(&document.key)
                    .execute(&mut **tx).await?;
                for (name, value) in lookups {
                    let inserted = sqlx::query("INSERT INTO document_lookups (collection, name, value, key) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING")
                        .bind(collection.as_str()).bind(&name).bind(&value).bind(&document.key)
                        .execute(&mut **tx).await?;
                    if inserted.rows_affected() == 0 {
                        return Err(StoreError::Duplicate { lookup: name, value });
                    }
                }
            }
            Write::Delete { collection, key, expected_version } => {
                let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2 AND version = $3")
                    .bind(collection.as_str()).bind(&key).bind(expected_version)
                    .execute(&mut **tx).await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict { collection, key });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<RawDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT key, version, owner, tag, body FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection.as_str()).bind(key)
            .fetch_optional(&self.db).await?;
        Ok(row.map(Into::into))
    }

    async fn find(&self, collection: Collection, lookup: &str, value: &str) -> Result<Option<RawDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT d.key, d.version, d.owner, d.tag, d.body FROM document_lookups l JOIN documents d ON d.collection = l.collection AND d.key = l.key WHERE l.collection = $1 AND l.name = $2 AND l.value = $3")
            .bind(collection.as_str()).bind(lookup).bind(value)
            .fetch_optional(&self.db).await?;
        Ok(row.map(Into::into))
    }

    async fn scan(&self, collection: Collection, scope: &Scope) -> Result<Vec<RawDocument>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>("SELECT key, version, owner, tag, body FROM documents WHERE collection = $1 AND ($2::TEXT IS NULL OR owner = $2) AND ($3::TEXT IS NULL OR tag = $3) ORDER BY key")
            .bind(collection.as_str()).bind(&scope.owner).bind(&scope.tag)
            .fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        for write in writes {
            Self::apply(&mut tx, write).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
