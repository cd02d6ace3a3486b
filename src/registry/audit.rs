use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;

/// One row snapshot, keyed by column name. Values keep their JSON-natural
/// types so the log stays machine-readable.
pub type Snapshot = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Add,
    Update,
    Delete,
    BulkEdit,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkEdit => "bulk_edit",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit log row. Entries are append-only; nothing in the
/// crate rewrites or deletes them.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub user: String,
    pub action: AuditAction,
    pub record_id: Option<i64>,
    pub name: Option<String>,
    pub changed_fields: Vec<String>,
    /// Serialized JSON of the pre-mutation snapshot, `{}` when absent.
    pub before: String,
    /// Serialized JSON of the post-mutation snapshot, `{}` when absent.
    pub after: String,
}

impl AuditEntry {
    /// The changed-field list as stored in the log file.
    pub fn changed_fields_text(&self) -> String {
        self.changed_fields.join(", ")
    }
}

/// Builds the audit entry for one mutation.
///
/// The record id and name prefer the after snapshot and fall back to the
/// before snapshot. An empty user is recorded as "-". Snapshot
/// serialization is fail-soft: a failure degrades to a debug rendering
/// rather than aborting the mutation that is being logged.
pub fn build_entry(
    action: AuditAction,
    user: &str,
    before: Option<&Snapshot>,
    after: Option<&Snapshot>,
) -> AuditEntry {
    let user = if user.trim().is_empty() {
        "-".to_string()
    } else {
        user.to_string()
    };

    AuditEntry {
        ts: Utc::now(),
        user,
        action,
        record_id: snapshot_id(after).or_else(|| snapshot_id(before)),
        name: snapshot_text(after, "name").or_else(|| snapshot_text(before, "name")),
        changed_fields: diff_fields(before, after),
        before: render_snapshot(before),
        after: render_snapshot(after),
    }
}

/// Field names whose string forms differ between the snapshots, sorted.
///
/// With both snapshots present the union of keys is compared; a key missing
/// on one side reads as null, so absent and explicit-null agree. With one
/// snapshot the whole key set is reported; with none the list is empty.
pub fn diff_fields(before: Option<&Snapshot>, after: Option<&Snapshot>) -> Vec<String> {
    let mut fields: Vec<String> = match (before, after) {
        (Some(b), Some(a)) => {
            let mut keys: BTreeSet<&String> = b.keys().collect();
            keys.extend(a.keys());
            keys.into_iter()
                .filter(|k| value_text(b.get(*k)) != value_text(a.get(*k)))
                .cloned()
                .collect()
        }
        (Some(only), None) | (None, Some(only)) => only.keys().cloned().collect(),
        (None, None) => Vec::new(),
    };
    fields.sort();
    fields
}

/// Captures one store row as a snapshot for before/after logging.
pub fn snapshot_row(df: &DataFrame, row: usize) -> Result<Snapshot> {
    let mut snap = Snapshot::new();
    for col in df.get_columns() {
        let s = col.as_materialized_series();
        let av = s.get(row)?;
        snap.insert(s.name().to_string(), cell_value(&av));
    }
    Ok(snap)
}

fn snapshot_id(snap: Option<&Snapshot>) -> Option<i64> {
    match snap?.get("id")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn snapshot_text(snap: Option<&Snapshot>, key: &str) -> Option<String> {
    match snap?.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// String form used for diffing. A missing key and an explicit null render
/// identically.
fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_snapshot(snap: Option<&Snapshot>) -> String {
    match snap {
        None => "{}".to_string(),
        Some(m) => serde_json::to_string(m).unwrap_or_else(|_| format!("{m:?}")),
    }
}

fn cell_value(av: &AnyValue<'_>) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String((*s).to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::Number((*v).into()),
        AnyValue::Int16(v) => Value::Number((*v).into()),
        AnyValue::Int32(v) => Value::Number((*v).into()),
        AnyValue::Int64(v) => Value::Number((*v).into()),
        AnyValue::UInt8(v) => Value::Number((*v).into()),
        AnyValue::UInt16(v) => Value::Number((*v).into()),
        AnyValue::UInt32(v) => Value::Number((*v).into()),
        AnyValue::UInt64(v) => Value::Number((*v).into()),
        AnyValue::Float32(v) => float_value(f64::from(*v)),
        AnyValue::Float64(v) => float_value(*v),
        AnyValue::Date(days) => Value::String(format_date_ms(i64::from(*days) * 86_400_000, true)),
        AnyValue::Datetime(v, tu, _) => Value::String(format_date_ms(unit_ms(*v, *tu), false)),
        AnyValue::DatetimeOwned(v, tu, _) => Value::String(format_date_ms(unit_ms(*v, *tu), false)),
        other => Value::String(other.to_string()),
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn unit_ms(v: i64, tu: TimeUnit) -> i64 {
    match tu {
        TimeUnit::Nanoseconds => v / 1_000_000,
        TimeUnit::Microseconds => v / 1_000,
        TimeUnit::Milliseconds => v,
    }
}

fn format_date_ms(ms: i64, date_only: bool) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) if date_only => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}
