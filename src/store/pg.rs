use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};

use super::{Document, DocumentStore, StoreError};

/// Postgres-backed document store: one `documents` table keyed by
/// (collection, id) with a jsonb `fields` column. Every call is bounded by a
/// timeout; elapsing maps to `Unavailable`, never to an absent record.
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(res) => res.map_err(map_sqlx),
            Err(_) => Err(StoreError::Unavailable("operation timed out".into())),
        }
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StoreError::Unavailable(e.to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}

fn deltas_to_json(deltas: &[(&str, i64)]) -> Value {
    let mut obj = Map::new();
    for (field, delta) in deltas {
        obj.insert(field.to_string(), Value::from(*delta));
    }
    Value::Object(obj)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        let res = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, fields)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id) DO NOTHING
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(&fields)
                .execute(&self.pool),
            )
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.bounded(
            sqlx::query_scalar::<_, Value>(
                r#"SELECT fields FROM documents WHERE collection = $1 AND id = $2"#,
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Document>, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    r#"
                    SELECT id, fields FROM documents
                    WHERE collection = $1 AND fields @> $2
                    LIMIT 1
                    "#,
                )
                .bind(collection)
                .bind(&filter)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(|r| Document {
            id: r.get("id"),
            fields: r.get("fields"),
        }))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = self
            .bounded(
                sqlx::query(
                    r#"
                    SELECT id, fields FROM documents
                    WHERE collection = $1 AND fields @> $2
                    ORDER BY id
                    "#,
                )
                .bind(collection)
                .bind(&filter)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Document {
                id: r.get("id"),
                fields: r.get("fields"),
            })
            .collect())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool, StoreError> {
        let res = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE documents SET fields = fields || $3
                    WHERE collection = $1 AND id = $2
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(&patch)
                .execute(&self.pool),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: Value,
        patch: Value,
    ) -> Result<bool, StoreError> {
        let res = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE documents SET fields = fields || $5
                    WHERE collection = $1 AND id = $2 AND fields -> $3::text = $4
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(guard_field)
                .bind(&expected)
                .bind(&patch)
                .execute(&self.pool),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn adjust(
        &self,
        collection: &str,
        id: &str,
        deltas: &[(&str, i64)],
    ) -> Result<(), StoreError> {
        // Single upsert statement so concurrent adjustments never lose an
        // update; missing counters count as zero.
        self.bounded(
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, fields)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO UPDATE
                SET fields = documents.fields || (
                    SELECT jsonb_object_agg(
                        d.key,
                        to_jsonb(COALESCE((documents.fields ->> d.key)::bigint, 0) + d.value::bigint)
                    )
                    FROM jsonb_each_text(EXCLUDED.fields) AS d(key, value)
                )
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(deltas_to_json(deltas))
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let res = self
            .bounded(
                sqlx::query(r#"DELETE FROM documents WHERE collection = $1 AND id = $2"#)
                    .bind(collection)
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
