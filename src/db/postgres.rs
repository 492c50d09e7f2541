use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{Direction, Document, DocumentStore, Fields, Precondition, Query, StoreError};

/// Document store on a single PostgreSQL JSONB table.
///
/// Merges use the JSONB `||` operator, which replaces top-level keys and
/// leaves the rest of the document untouched.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(id: String, data: Value) -> Result<Document, StoreError> {
        match data {
            Value::Object(data) => Ok(Document { id, data }),
            other => Err(StoreError::Malformed(format!(
                "{}: expected an object, got {}",
                id, other
            ))),
        }
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (SELECT 1 FROM documents WHERE collection = $1 AND id = $2) AS found
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("found")?)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(Self::decode(r.try_get("id")?, r.try_get("data")?)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, collection: &str, id: &str, data: Fields) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError> {
        match precondition {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, data)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id)
                    DO UPDATE SET data = documents.data || EXCLUDED.data,
                                  updated_at = NOW()
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(Value::Object(fields))
                .execute(&self.pool)
                .await?;
                Ok(())
            }
            Some(Precondition::FieldEquals(field, expected)) => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = data || $3,
                        updated_at = NOW()
                    WHERE collection = $1 AND id = $2 AND data -> $4 = $5
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(Value::Object(fields))
                .bind(field)
                .bind(expected)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() > 0 {
                    return Ok(());
                }
                if self.exists(collection, id).await? {
                    Err(StoreError::PreconditionFailed)
                } else {
                    Err(StoreError::NotFound)
                }
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        for (field, value) in &query.filters {
            builder.push(" AND data -> ");
            builder.push_bind(field.clone());
            builder.push(" = ");
            builder.push_bind(value.clone());
        }

        match &query.order_by {
            Some((field, direction)) => {
                builder.push(" ORDER BY data -> ");
                builder.push_bind(field.clone());
                builder.push(match direction {
                    Direction::Ascending => " ASC, id ASC",
                    Direction::Descending => " DESC, id DESC",
                });
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| Self::decode(r.try_get("id")?, r.try_get("data")?))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
