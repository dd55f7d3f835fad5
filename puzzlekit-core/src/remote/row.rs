//! Lenient decoding of remote profile rows.
//!
//! Corrupted progress data degrades to zero XP / no completions for the
//! offending field instead of failing the session.

use serde_json::Value;

use crate::profile::{Profile, PuzzleId};

pub(crate) const XP_FIELD: &str = "xp";
pub(crate) const COMPLETED_FIELD: &str = "completed_puzzles";

pub(crate) fn profile_from_row(row: &Value) -> Profile {
    if !row.is_object() {
        tracing::warn!(row = %row, "profile row is not an object; using an empty profile");
        return Profile::new();
    }
    Profile::from_parts(xp_from_row(row), completed_from_row(row))
}

fn xp_from_row(row: &Value) -> u64 {
    match row.get(XP_FIELD) {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_u64().unwrap_or_else(|| {
            tracing::warn!(xp = %value, "profile xp is not a non-negative integer; using 0");
            0
        }),
    }
}

fn completed_from_row(row: &Value) -> Vec<PuzzleId> {
    match row.get(COMPLETED_FIELD) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(id) if !id.is_empty() => Some(PuzzleId::new(id.as_str())),
                other => {
                    tracing::warn!(entry = %other, "skipping malformed completed puzzle entry");
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!(
                completed_puzzles = %other,
                "completed_puzzles is not an array; using an empty set"
            );
            Vec::new()
        }
    }
}
