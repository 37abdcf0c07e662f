// SqliteStore — rusqlite backend implementing the DocumentStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across an .await on anything else.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::Mutex;

use super::models::Collection;
use super::traits::DocumentStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// An in-memory store with the schema applied. Used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn get_record(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let json = {
            let conn = self.conn.lock().await;
            super::queries::get_document(&conn, collection.as_str(), id)?
        };
        match json {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("Stored {collection}/{id} is not valid JSON"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_record(&self, collection: Collection, id: &str, data: &Value) -> Result<()> {
        let json = serde_json::to_string(data)?;
        let conn = self.conn.lock().await;
        super::queries::put_document(&conn, collection.as_str(), id, &json)
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &Value,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::update_document_fields(&conn, collection.as_str(), id, fields)
    }

    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        super::queries::list_document_ids(&conn, collection.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_trait_record_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_record(Collection::Users, "U1").await.unwrap().is_none());

        let doc = json!({"code": "U1", "name": "Ana"});
        store.set_record(Collection::Users, "U1", &doc).await.unwrap();
        assert_eq!(store.get_record(Collection::Users, "U1").await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_trait_set_replaces_whole_record() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .set_record(Collection::Users, "U1", &json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        store
            .set_record(Collection::Users, "U1", &json!({"a": 3}))
            .await
            .unwrap();
        assert_eq!(
            store.get_record(Collection::Users, "U1").await.unwrap(),
            Some(json!({"a": 3}))
        );
    }

    #[tokio::test]
    async fn test_trait_update_fields() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .set_record(Collection::Sessions, "S1", &json!({"name": "Party"}))
            .await
            .unwrap();
        let updated = store
            .update_fields(Collection::Sessions, "S1", &json!({"status": "matched"}))
            .await
            .unwrap();
        assert!(updated);

        let missing = store
            .update_fields(Collection::Sessions, "S2", &json!({"status": "matched"}))
            .await
            .unwrap();
        assert!(!missing);

        let doc = store.get_record(Collection::Sessions, "S1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Party");
        assert_eq!(doc["status"], "matched");
    }

    #[tokio::test]
    async fn test_trait_list_ids() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_record(Collection::Users, "A", &json!({})).await.unwrap();
        store.set_record(Collection::Users, "B", &json!({})).await.unwrap();
        store.set_record(Collection::Sessions, "S", &json!({})).await.unwrap();

        let mut ids = store.list_ids(Collection::Users).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.table_count().await.unwrap(), 2);
    }
}
