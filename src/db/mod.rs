use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::cmp::Ordering;
use std::time::Duration;

pub mod memory;
pub mod postgres;

/// Top-level fields of a stored document.
pub type Fields = Map<String, Value>;

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    /// Decode the document into a typed record.
    pub fn into_record<T: DeserializeOwned>(self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.data))
            .map_err(|e| StoreError::Malformed(format!("{}: {}", self.id, e)))
    }
}

/// Encode a record as top-level document fields.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Malformed(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Condition checked atomically with a merge write.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The document exists and `field` currently equals the value.
    FieldEquals(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered, optionally ordered and limited multi-document read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| data.get(field) == Some(value))
    }
}

/// Ordering used for `order_by`: null < bool < number < string; other kinds compare equal.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Collection-addressed document database.
///
/// Every write touches exactly one document; there are no cross-document
/// transactions. Implementations provide read-your-writes per document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document, failing with `AlreadyExists` if the id is taken.
    async fn create(&self, collection: &str, id: &str, data: Fields) -> Result<(), StoreError>;

    /// Shallow-merge `fields` into a document.
    ///
    /// Without a precondition this upserts. With one, the document must exist
    /// and satisfy it, checked atomically with the write.
    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<Precondition>,
    ) -> Result<(), StoreError>;

    /// Remove a document. Removing a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Round-trip check for health probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document already exists")]
    AlreadyExists,

    #[error("Document not found")]
    NotFound,

    #[error("Write precondition failed")]
    PreconditionFailed,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}
