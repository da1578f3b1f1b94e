use rusqlite::Connection;

use super::kv::{kv_get_json, kv_keys_with_prefix, kv_set_json};
use crate::db::DatabaseError;
use crate::models::Case;

const CASE_KEY_PREFIX: &str = "case_";
const CASE_DATA_SUFFIX: &str = "_data";

pub fn case_data_key(case_id: &str) -> String {
    format!("{CASE_KEY_PREFIX}{case_id}{CASE_DATA_SUFFIX}")
}

/// Store the intake payload for a case (overwrites).
pub fn save_case(conn: &Connection, case: &Case) -> Result<(), DatabaseError> {
    kv_set_json(conn, &case_data_key(&case.id), case)
}

/// Load a case by id. Unreadable payloads count as missing.
pub fn load_case(conn: &Connection, case_id: &str) -> Result<Option<Case>, DatabaseError> {
    let case: Option<Case> = kv_get_json(conn, &case_data_key(case_id))?;
    Ok(case.map(|mut c| {
        c.id = case_id.to_string();
        c
    }))
}

/// Ids of all stored cases, most recent first.
pub fn list_case_ids(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let keys = kv_keys_with_prefix(conn, CASE_KEY_PREFIX)?;
    Ok(keys
        .into_iter()
        .filter_map(|k| {
            k.strip_prefix(CASE_KEY_PREFIX)
                .and_then(|rest| rest.strip_suffix(CASE_DATA_SUFFIX))
                .map(str::to_string)
        })
        .collect())
}
