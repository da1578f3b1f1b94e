use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Read a raw value. Returns None if the key is not set.
pub fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT value FROM kv_entries WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Write a raw value (upsert).
pub fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO kv_entries (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn kv_remove(conn: &Connection, key: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key])?;
    Ok(())
}

/// All keys starting with `prefix`, most recently written first.
pub fn kv_keys_with_prefix(conn: &Connection, prefix: &str) -> Result<Vec<String>, DatabaseError> {
    let pattern = format!("{}%", escape_like(prefix));
    let mut stmt = conn.prepare(
        "SELECT key FROM kv_entries WHERE key LIKE ?1 ESCAPE '\\'
         ORDER BY updated_at DESC, key DESC",
    )?;
    let rows = stmt.query_map([pattern], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Serialize `value` as JSON and store it under `key`.
pub fn kv_set_json<T: serde::Serialize>(
    conn: &Connection,
    key: &str,
    value: &T,
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(value).map_err(|e| DatabaseError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    kv_set(conn, key, &json)
}

/// Read and deserialize a JSON entry.
///
/// A value that no longer parses is treated as absent: it is logged and
/// `None` is returned so callers fall back to their defaults.
pub fn kv_get_json<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    key: &str,
) -> Result<Option<T>, DatabaseError> {
    let Some(raw) = kv_get(conn, key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Stored entry unreadable, treating as missing");
            Ok(None)
        }
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn get_missing_returns_none() {
        let conn = open_memory_database().unwrap();
        assert_eq!(kv_get(&conn, "nope").unwrap(), None);
    }

    #[test]
    fn set_overwrites() {
        let conn = open_memory_database().unwrap();
        kv_set(&conn, "k", "one").unwrap();
        kv_set(&conn, "k", "two").unwrap();
        assert_eq!(kv_get(&conn, "k").unwrap().as_deref(), Some("two"));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_entries WHERE key = 'k'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn remove_deletes() {
        let conn = open_memory_database().unwrap();
        kv_set(&conn, "k", "v").unwrap();
        kv_remove(&conn, "k").unwrap();
        assert_eq!(kv_get(&conn, "k").unwrap(), None);
    }

    #[test]
    fn prefix_scan_treats_underscore_literally() {
        let conn = open_memory_database().unwrap();
        kv_set(&conn, "case_A_data", "{}").unwrap();
        kv_set(&conn, "caseXB_data", "{}").unwrap();
        kv_set(&conn, "medai_user", "{}").unwrap();
        let keys = kv_keys_with_prefix(&conn, "case_").unwrap();
        assert_eq!(keys, vec!["case_A_data".to_string()]);
    }

    #[test]
    fn unreadable_json_is_absent() {
        let conn = open_memory_database().unwrap();
        kv_set(&conn, "broken", "{not json").unwrap();
        let value: Option<serde_json::Value> = kv_get_json(&conn, "broken").unwrap();
        assert!(value.is_none());
    }
}
