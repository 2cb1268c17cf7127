use async_trait::async_trait;
use serde_json::Value;

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// One stored record: its id plus the JSON fields.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing store unreachable or the call timed out. Retryable; callers
    /// surface 503 and must never treat this as "record absent".
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },
    #[error("store error: {0}")]
    Backend(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Generic async contract over the external document store.
///
/// Every record lives in a named collection under a string id and carries a
/// flat JSON object of fields. The guarded and counter operations exist so
/// callers can stay within single-document atomicity instead of doing
/// read-modify-write over two round trips.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError>;

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// First document whose fields contain every key/value pair of `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_many(&self, collection: &str, filter: Value)
        -> Result<Vec<Document>, StoreError>;

    /// Shallow-merges `patch` into the document. Returns false when absent.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool, StoreError>;

    /// Guarded merge: applies `patch` only while `guard_field` still equals
    /// `expected`. Returns false when the guard did not match, which callers
    /// use to detect a lost race.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: Value,
        patch: Value,
    ) -> Result<bool, StoreError>;

    /// Atomically adds `deltas` to numeric fields in one statement, creating
    /// the document with the deltas as initial values when absent.
    async fn adjust(
        &self,
        collection: &str,
        id: &str,
        deltas: &[(&str, i64)],
    ) -> Result<(), StoreError>;

    /// Returns true when a document was actually removed.
    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}
