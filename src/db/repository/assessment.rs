use rusqlite::Connection;

use super::kv::{kv_get_json, kv_set_json};
use crate::db::DatabaseError;
use crate::models::AssessmentResult;

pub fn case_result_key(case_id: &str) -> String {
    format!("case_{case_id}_result")
}

/// Store the assessment for a case. A second write replaces the first.
pub fn save_result(
    conn: &Connection,
    case_id: &str,
    result: &AssessmentResult,
) -> Result<(), DatabaseError> {
    kv_set_json(conn, &case_result_key(case_id), result)
}

pub fn load_result(
    conn: &Connection,
    case_id: &str,
) -> Result<Option<AssessmentResult>, DatabaseError> {
    kv_get_json(conn, &case_result_key(case_id))
}
