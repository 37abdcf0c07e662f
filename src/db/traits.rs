// Document store trait — backend-agnostic async interface.
//
// Implementor: SqliteStore (wraps rusqlite). All methods are async so a
// sync backend behind a Mutex and a native async backend fit behind the
// same interface. Records are plain JSON documents; typed access lives in
// `db::records`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::models::Collection;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    /// Load a document, or None if it doesn't exist.
    async fn get_record(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Store a document, replacing any previous content.
    async fn set_record(&self, collection: Collection, id: &str, data: &Value) -> Result<()>;

    /// Merge fields into an existing document. Keys may be dotted paths
    /// (`profileData.listeningHistory`). Returns false if the document
    /// doesn't exist.
    async fn update_fields(&self, collection: Collection, id: &str, fields: &Value)
        -> Result<bool>;

    /// List document ids in a collection, most recently updated first.
    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>>;
}
