// Database queries — document CRUD over the `documents` table.
//
// Every database interaction goes through this module. The SqliteStore
// trait implementation delegates here, and tests can exercise these
// functions against a bare in-memory Connection.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

/// Load a document's JSON text.
pub fn get_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")?;
    let result = stmt
        .query_row(params![collection, id], |row| row.get(0))
        .optional()?;
    Ok(result)
}

/// Store a document, replacing any previous content (upsert).
pub fn put_document(conn: &Connection, collection: &str, id: &str, data_json: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO documents (collection, id, data, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(collection, id) DO UPDATE SET
            data = ?3,
            updated_at = datetime('now')",
        params![collection, id, data_json],
    )?;
    Ok(())
}

/// Merge `fields` into an existing document.
///
/// Returns false (and writes nothing) if the document does not exist.
pub fn update_document_fields(
    conn: &Connection,
    collection: &str,
    id: &str,
    fields: &Value,
) -> Result<bool> {
    let Some(existing) = get_document(conn, collection, id)? else {
        return Ok(false);
    };

    let mut doc: Value = serde_json::from_str(&existing)
        .with_context(|| format!("Stored {collection}/{id} is not valid JSON"))?;
    merge_fields(&mut doc, fields)?;

    put_document(conn, collection, id, &serde_json::to_string(&doc)?)?;
    Ok(true)
}

/// List document ids in a collection, most recently updated first.
pub fn list_document_ids(conn: &Connection, collection: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM documents WHERE collection = ?1 ORDER BY updated_at DESC, id",
    )?;
    let rows = stmt.query_map(params![collection], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Apply a partial update to a JSON document.
///
/// Each top-level key of `fields` is a field path; dots address nested
/// objects (`profileData.listeningHistory`). Missing or non-object
/// intermediate values are replaced by empty objects. Leaves are replaced
/// wholesale, not deep-merged.
pub fn merge_fields(doc: &mut Value, fields: &Value) -> Result<()> {
    let Value::Object(updates) = fields else {
        anyhow::bail!("Field update must be a JSON object");
    };
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }

    for (path, value) in updates {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(leaf) = segments.pop() else { continue };

        let mut target = &mut *doc;
        for segment in segments {
            let obj = target
                .as_object_mut()
                .context("Field path walked into a non-object")?;
            let entry = obj
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            target = entry;
        }

        target
            .as_object_mut()
            .context("Field path walked into a non-object")?
            .insert(leaf.to_string(), value.clone());
    }

    Ok(())
}
