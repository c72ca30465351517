//! Pure helpers over JSON-Patch operation lists.
//!
//! Handlers use these to carve the slice of a patch document they own:
//! prefix filtering (with the prefix stripped from surviving paths),
//! allow-list restriction, positional segment extraction, and candidate
//! next-state computation for equality comparison.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::PatchError;
use crate::models::{PatchOp, PatchOperation, ReasonEntry};

/// Operations whose first path segment equals `prefix`, with that segment
/// stripped: `/client/wcbFirmNumber` filtered by `client` becomes
/// `/wcbFirmNumber`.
pub fn filter_by_prefix(ops: &[PatchOperation], prefix: &str) -> Vec<PatchOperation> {
    ops.iter()
        .filter_map(|op| {
            let rest = op.path.strip_prefix('/')?;
            let (head, tail) = match rest.split_once('/') {
                Some((head, tail)) => (head, format!("/{tail}")),
                None => (rest, String::new()),
            };
            (head == prefix).then(|| PatchOperation {
                op: op.op,
                path: tail,
                value: op.value.clone(),
            })
        })
        .collect()
}

/// Operations of one kind.
pub fn filter_op(ops: &[PatchOperation], kind: PatchOp) -> Vec<PatchOperation> {
    ops.iter().filter(|o| o.op == kind).cloned().collect()
}

/// Split `ops` into (allowed, dropped) by exact path membership in the
/// allow-list. Dropped operations are returned so callers can log them;
/// they must never reach storage.
pub fn restrict_paths<'a>(
    ops: &'a [PatchOperation],
    allowed: &[&str],
) -> (Vec<PatchOperation>, Vec<&'a PatchOperation>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for op in ops {
        if allowed.contains(&op.path.as_str()) {
            kept.push(op.clone());
        } else {
            dropped.push(op);
        }
    }
    (kept, dropped)
}

/// Extract path segment `index` (zero-based, counting from after the leading
/// slash). `/00/emailAddress` has segment 0 = `00`, segment 1 = `emailAddress`.
pub fn path_segment(path: &str, index: usize) -> Result<&str, PatchError> {
    path.strip_prefix('/')
        .and_then(|rest| rest.split('/').nth(index))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PatchError::malformed(format!("path {path} has no segment {index}")))
}

/// Number of path segments after the leading slash; `/5/locationCodes/0`
/// has three.
pub fn segment_count(path: &str) -> usize {
    match path.strip_prefix('/') {
        Some("") | None => 0,
        Some(rest) => rest.split('/').count(),
    }
}

/// Parse path segment `index` as a positional array index. `-` (append) is
/// not a resolvable index and is rejected here.
pub fn path_index(path: &str, index: usize) -> Result<usize, PatchError> {
    let seg = path_segment(path, index)?;
    seg.parse()
        .map_err(|_| PatchError::malformed(format!("path {path}: segment {seg:?} is not an index")))
}

/// Apply `replace` operations onto `current` and return the candidate
/// next-state. Paths are JSON pointers relative to the serialized record;
/// a pointer that does not resolve is a malformed patch.
pub fn apply_replace<T>(current: &T, ops: &[PatchOperation]) -> Result<T, PatchError>
where
    T: Serialize + DeserializeOwned,
{
    let mut doc = serde_json::to_value(current)
        .map_err(|e| PatchError::malformed(format!("record not representable as JSON: {e}")))?;

    for op in ops.iter().filter(|o| o.op == PatchOp::Replace) {
        let slot = doc
            .pointer_mut(&op.path)
            .ok_or_else(|| PatchError::malformed(format!("unknown field path {}", op.path)))?;
        *slot = op.value.clone().unwrap_or(Value::Null);
    }

    serde_json::from_value(doc)
        .map_err(|e| PatchError::malformed(format!("candidate state invalid: {e}")))
}

/// All `/reasons/-` annotations in the document.
pub fn reason_entries(ops: &[PatchOperation]) -> Vec<ReasonEntry> {
    ops.iter()
        .filter(|o| o.op == PatchOp::Add && o.path.strip_prefix('/').is_some_and(|p| p == "reasons" || p.starts_with("reasons/")))
        .filter_map(|o| o.value.clone())
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Reason annotations whose `field` equals the given handler field path.
pub fn reasons_for_field(ops: &[PatchOperation], field: &str) -> Vec<ReasonEntry> {
    reason_entries(ops)
        .into_iter()
        .filter(|r| r.field == field)
        .collect()
}
