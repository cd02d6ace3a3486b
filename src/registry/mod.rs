//! Record registry: the canonical item set plus its append-only history.
//!
//! All mutations go through [`Registry`], which serializes writers, keeps
//! ids stable and pairs every change with one audit entry.

pub mod audit;
pub mod store;
pub mod view;

use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::collections::BTreeMap;

use crate::auth::RequestContext;
use crate::catalog;
use crate::config::Settings;
use crate::error::{Result, StockbookError};
use crate::importer::normalize;

pub use audit::{AuditAction, AuditEntry};
pub use store::RecordStore;
pub use view::ListFilter;

use audit::{Snapshot, build_entry, snapshot_row};

/// Field values for a newly created record. Only `name` and `member` must
/// be present; everything else may stay empty.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub name: String,
    pub member: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub producer: Option<String>,
    pub region: Option<String>,
    pub polish_ratio: Option<String>,
    pub note: Option<String>,
    pub meeting_no: Option<String>,
    pub meeting_at: Option<String>,
    /// Record date; "now" when not given.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Staged field edits for [`Registry::update`]. Values arrive as text and
/// are coerced the same way an import coerces them.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    fields: BTreeMap<String, String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages one field. Canonical fields other than `id` and `updated_at`
    /// are editable; anything else is rejected.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        if !is_editable(field) {
            return Err(StockbookError::Other(format!(
                "Field '{field}' is not editable"
            )));
        }
        self.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_editable(field: &str) -> bool {
    field != "id" && field != "updated_at" && catalog::is_canonical(field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Every staged value already matched; nothing was written or logged.
    NoChange,
}

/// Outcome of a bulk edit: existing rows overwritten and new rows appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkEditSummary {
    pub rows: usize,
    pub added: usize,
}

pub struct Registry {
    store: RecordStore,
}

impl Registry {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn open(settings: &Settings) -> Result<Self> {
        let store = RecordStore::new(settings.items_path()?, settings.logs_path()?)?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The full item set as stored.
    pub fn items(&self) -> Result<DataFrame> {
        self.store.load_items()
    }

    pub fn list(&self, filter: &ListFilter) -> Result<DataFrame> {
        let items = self.store.load_items()?;
        view::filter_items(&items, filter)
    }

    pub fn history(&self, limit: usize) -> Result<DataFrame> {
        self.store.recent_logs(limit)
    }

    /// Replaces the item store with a freshly normalized frame.
    pub fn import(&self, ctx: &RequestContext, df: &DataFrame) -> Result<usize> {
        let _guard = self.store.guard();
        self.store.save_items(df)?;
        tracing::info!("{} imported {} item rows", ctx.user, df.height());
        Ok(df.height())
    }

    /// Appends one record with a freshly assigned id and returns that id.
    pub fn add(&self, ctx: &RequestContext, record: &NewRecord) -> Result<i64> {
        if record.name.trim().is_empty() {
            return Err(StockbookError::Other(
                "Record name must not be empty".to_string(),
            ));
        }
        if record.member.trim().is_empty() {
            return Err(StockbookError::Other(
                "Member name must not be empty".to_string(),
            ));
        }

        let _guard = self.store.guard();
        let mut items = self.store.load_items()?;
        let id = next_id(&items)?;
        let stamp = record.updated_at.unwrap_or_else(Utc::now);

        let row = new_row(&items, id, record, stamp)?;
        items.vstack_mut(&row)?;
        let after = snapshot_row(&items, items.height() - 1)?;
        self.store.save_items(&items)?;

        let entry = build_entry(AuditAction::Add, &ctx.user, None, Some(&after));
        self.store.append_log(&entry)?;
        tracing::info!("{} added record {} '{}'", ctx.user, id, record.name.trim());
        Ok(id)
    }

    /// Applies staged edits to one record. When every staged value already
    /// matches the stored one, nothing is written and no entry is logged.
    pub fn update(&self, ctx: &RequestContext, id: i64, patch: &RecordPatch) -> Result<UpdateOutcome> {
        if let Some(name) = patch.get("name")
            && name.trim().is_empty()
        {
            return Err(StockbookError::Other(
                "Record name must not be empty".to_string(),
            ));
        }

        let _guard = self.store.guard();
        let mut items = self.store.load_items()?;
        let row = find_row(&items, id)?;
        let before = snapshot_row(&items, row)?;

        let mut unchanged = true;
        for (field, value) in patch.fields() {
            let current = current_text(&items, field, row)?;
            if current.as_deref().unwrap_or("") != value.trim() {
                unchanged = false;
                break;
            }
        }
        if unchanged {
            tracing::info!("Update of record {id} skipped, no changes");
            return Ok(UpdateOutcome::NoChange);
        }

        for (field, value) in patch.fields() {
            set_field(&mut items, field, row, value)?;
        }
        set_datetime_cell(&mut items, "updated_at", row, Utc::now().timestamp_millis())?;

        let after = snapshot_row(&items, row)?;
        self.store.save_items(&items)?;

        let entry = build_entry(AuditAction::Update, &ctx.user, Some(&before), Some(&after));
        tracing::info!(
            "{} updated record {} ({})",
            ctx.user,
            id,
            entry.changed_fields_text()
        );
        self.store.append_log(&entry)?;
        Ok(UpdateOutcome::Updated)
    }

    /// Removes one record, logging its last known state first.
    pub fn delete(&self, ctx: &RequestContext, id: i64) -> Result<()> {
        let _guard = self.store.guard();
        let items = self.store.load_items()?;
        let row = find_row(&items, id)?;
        let before = snapshot_row(&items, row)?;

        let entry = build_entry(AuditAction::Delete, &ctx.user, Some(&before), None);
        self.store.append_log(&entry)?;

        let ids = items.column("id")?.as_materialized_series().i64()?.clone();
        let keep: Vec<bool> = ids.into_iter().map(|v| v != Some(id)).collect();
        let remaining = items.filter(&BooleanChunked::from_slice("keep".into(), &keep))?;
        self.store.save_items(&remaining)?;
        tracing::info!("{} deleted record {}", ctx.user, id);
        Ok(())
    }

    /// Merges an edited copy of the item table back into the store.
    ///
    /// Rows whose id matches a record that existed before the call
    /// overwrite the shared columns (`updated_at` is stamped, never
    /// copied). Rows without an id are appended with freshly assigned ids.
    /// Rows with an id that matches nothing are skipped; a row appended
    /// earlier in the same call is never a match. Every stored row gets
    /// `updated_at` = now.
    pub fn bulk_edit(&self, ctx: &RequestContext, edited: &DataFrame) -> Result<BulkEditSummary> {
        if edited.column("id").is_err() {
            return Err(StockbookError::DataProcessing(
                "Bulk edit frame has no id column".to_string(),
            ));
        }

        let _guard = self.store.guard();
        let mut items = self.store.load_items()?;

        let shared: Vec<String> = edited
            .get_column_names_str()
            .into_iter()
            .filter(|c| *c != "id" && *c != "updated_at" && items.column(c).is_ok())
            .map(str::to_string)
            .collect();

        // Edit targets come from the table as it stood at entry.
        let base_ids: Vec<i64> = items
            .column("id")?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .flatten()
            .collect();

        let mut summary = BulkEditSummary::default();
        let mut next = next_id(&items)?;
        for row in 0..edited.height() {
            match edited_id(edited, row)? {
                Some(id) if base_ids.contains(&id) => {
                    let target = find_row(&items, id)?;
                    for field in &shared {
                        copy_cell(edited, &mut items, field, row, target)?;
                    }
                    summary.rows += 1;
                }
                // Ids matching nothing in the base table are skipped.
                Some(_) => {}
                None => {
                    let appended = appended_row(&items, edited, &shared, row, next)?;
                    items.vstack_mut(&appended)?;
                    next += 1;
                    summary.added += 1;
                }
            }
        }

        stamp_all_updated_at(&mut items, Utc::now())?;
        self.store.save_items(&items)?;

        let mut after = Snapshot::new();
        after.insert("rows".to_string(), summary.rows.into());
        after.insert("added".to_string(), summary.added.into());
        let entry = build_entry(AuditAction::BulkEdit, &ctx.user, None, Some(&after));
        self.store.append_log(&entry)?;
        tracing::info!(
            "{} bulk edit: {} rows overwritten, {} appended",
            ctx.user,
            summary.rows,
            summary.added
        );
        Ok(summary)
    }
}

fn next_id(items: &DataFrame) -> Result<i64> {
    let max = items
        .column("id")?
        .as_materialized_series()
        .i64()?
        .max()
        .unwrap_or(0);
    Ok(max.max(0) + 1)
}

fn find_row(items: &DataFrame, id: i64) -> Result<usize> {
    let ids = items.column("id")?.as_materialized_series().i64()?.clone();
    ids.into_iter()
        .position(|v| v == Some(id))
        .ok_or_else(|| StockbookError::NotFound(format!("record id {id}")))
}

/// Id of one edited row, read leniently: numeric text counts, anything
/// unparseable counts as absent.
fn edited_id(edited: &DataFrame, row: usize) -> Result<Option<i64>> {
    let av = edited.column("id")?.as_materialized_series().get(row)?;
    Ok(normalize::cell_f64(&av)
        .filter(|v| v.is_finite())
        .map(|v| v as i64))
}

fn current_text(items: &DataFrame, field: &str, row: usize) -> Result<Option<String>> {
    let Ok(col) = items.column(field) else {
        return Ok(None);
    };
    let av = col.as_materialized_series().get(row)?;
    Ok(normalize::cell_string(&av))
}

fn set_field(items: &mut DataFrame, field: &str, row: usize, value: &str) -> Result<()> {
    if field == "quantity" {
        let v = value
            .trim()
            .parse::<f64>()
            .ok()
            .map_or(0, |n| (n as i64).max(0));
        return set_int_cell(items, field, row, v);
    }
    let trimmed = value.trim();
    let text = if trimmed.is_empty() { None } else { Some(trimmed) };
    set_string_cell(items, field, row, text)
}

fn copy_cell(
    edited: &DataFrame,
    items: &mut DataFrame,
    field: &str,
    edited_row: usize,
    target_row: usize,
) -> Result<()> {
    let av = edited
        .column(field)?
        .as_materialized_series()
        .get(edited_row)?;
    if field == "quantity" {
        let v = normalize::cell_f64(&av).map_or(0, |n| (n as i64).max(0));
        return set_int_cell(items, field, target_row, v);
    }
    let text = normalize::cell_string(&av);
    if items.column(field)?.dtype() == &DataType::String {
        set_string_cell(items, field, target_row, text.as_deref())
    } else {
        // Pass-through extras with non-text dtypes keep their stored value.
        Ok(())
    }
}

/// One-row frame matching the item schema, filled from an edited row's
/// shared columns.
fn appended_row(
    items: &DataFrame,
    edited: &DataFrame,
    shared: &[String],
    edited_row: usize,
    id: i64,
) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(items.width());
    for col in items.get_columns() {
        let s = col.as_materialized_series();
        let name = s.name().as_str();
        let series = if name == "id" {
            Series::new(s.name().clone(), vec![id])
        } else if name == "quantity" {
            let value = if shared.iter().any(|c| c == name) {
                let av = edited.column(name)?.as_materialized_series().get(edited_row)?;
                normalize::cell_f64(&av).map_or(0, |n| (n as i64).max(0))
            } else {
                0
            };
            Series::new(s.name().clone(), vec![value])
        } else if shared.iter().any(|c| c == name) && s.dtype() == &DataType::String {
            let av = edited.column(name)?.as_materialized_series().get(edited_row)?;
            Series::new(s.name().clone(), vec![normalize::cell_string(&av)])
        } else {
            Series::full_null(s.name().clone(), 1, s.dtype())
        };
        columns.push(series.into_column());
    }
    Ok(DataFrame::new(columns)?)
}

/// One-row frame for a brand new record, aligned to the item schema.
fn new_row(
    items: &DataFrame,
    id: i64,
    record: &NewRecord,
    stamp: DateTime<Utc>,
) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(items.width());
    for col in items.get_columns() {
        let s = col.as_materialized_series();
        let series = match s.name().as_str() {
            "id" => Series::new(s.name().clone(), vec![id]),
            "name" => Series::new(s.name().clone(), vec![Some(record.name.trim().to_string())]),
            "member" => Series::new(
                s.name().clone(),
                vec![Some(record.member.trim().to_string())],
            ),
            "quantity" => Series::new(s.name().clone(), vec![record.quantity.max(0)]),
            "updated_at" => Series::new(s.name().clone(), vec![stamp.timestamp_millis()])
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            "category" => Series::new(s.name().clone(), vec![clean_opt(record.category.as_deref())]),
            "producer" => Series::new(s.name().clone(), vec![clean_opt(record.producer.as_deref())]),
            "region" => Series::new(s.name().clone(), vec![clean_opt(record.region.as_deref())]),
            "polish_ratio" => Series::new(
                s.name().clone(),
                vec![clean_opt(record.polish_ratio.as_deref())],
            ),
            "note" => Series::new(s.name().clone(), vec![clean_opt(record.note.as_deref())]),
            "meeting_no" => Series::new(
                s.name().clone(),
                vec![clean_opt(record.meeting_no.as_deref())],
            ),
            "meeting_at" => Series::new(
                s.name().clone(),
                vec![clean_opt(record.meeting_at.as_deref())],
            ),
            _ => Series::full_null(s.name().clone(), 1, s.dtype()),
        };
        columns.push(series.into_column());
    }
    Ok(DataFrame::new(columns)?)
}

fn clean_opt(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn set_string_cell(
    items: &mut DataFrame,
    field: &str,
    row: usize,
    value: Option<&str>,
) -> Result<()> {
    let mut values: Vec<Option<String>> = items
        .column(field)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    if let Some(slot) = values.get_mut(row) {
        *slot = value.map(str::to_string);
    }
    items.replace(field, Series::new(field.into(), values))?;
    Ok(())
}

fn set_int_cell(items: &mut DataFrame, field: &str, row: usize, value: i64) -> Result<()> {
    let mut values: Vec<Option<i64>> = items
        .column(field)?
        .as_materialized_series()
        .i64()?
        .to_vec();
    if let Some(slot) = values.get_mut(row) {
        *slot = Some(value);
    }
    items.replace(field, Series::new(field.into(), values))?;
    Ok(())
}

fn set_datetime_cell(items: &mut DataFrame, field: &str, row: usize, ms: i64) -> Result<()> {
    let mut values: Vec<Option<i64>> = items
        .column(field)?
        .as_materialized_series()
        .cast(&DataType::Int64)?
        .i64()?
        .to_vec();
    if let Some(slot) = values.get_mut(row) {
        *slot = Some(ms);
    }
    let series = Series::new(field.into(), values)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    items.replace(field, series)?;
    Ok(())
}

fn stamp_all_updated_at(items: &mut DataFrame, now: DateTime<Utc>) -> Result<()> {
    let ms = now.timestamp_millis();
    let series = Series::new("updated_at".into(), vec![ms; items.height()])
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    items.replace("updated_at", series)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, clippy::indexing_slicing)]
    use super::*;
    use crate::auth::Role;
    use chrono::TimeZone as _;
    use tempfile::TempDir;

    fn test_registry() -> (TempDir, Registry) {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::new(
            temp.path().join("items.csv"),
            temp.path().join("logs.csv"),
        )
        .unwrap();
        (temp, Registry::new(store))
    }

    fn ctx() -> RequestContext {
        RequestContext::new("alice", Role::Admin)
    }

    fn sample_record(name: &str, member: &str) -> NewRecord {
        NewRecord {
            name: name.to_string(),
            member: member.to_string(),
            category: Some("純米".to_string()),
            ..NewRecord::default()
        }
    }

    fn column_text(df: &DataFrame, field: &str, row: usize) -> Option<String> {
        let av = df
            .column(field)
            .unwrap()
            .as_materialized_series()
            .get(row)
            .unwrap();
        normalize::cell_string(&av)
    }

    fn log_rows_with_action(registry: &Registry, action: &str) -> DataFrame {
        let logs = registry.store().load_logs().unwrap();
        let actions = logs.column("action").unwrap().as_materialized_series().clone();
        let mask: Vec<bool> = actions
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v == Some(action))
            .collect();
        logs.filter(&BooleanChunked::from_slice("m".into(), &mask))
            .unwrap()
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let (_temp, registry) = test_registry();

        let first = registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();
        let second = registry.add(&ctx(), &sample_record("銘柄B", "佐藤")).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let items = registry.items().unwrap();
        assert_eq!(items.height(), 2);
        assert_eq!(column_text(&items, "name", 1).unwrap(), "銘柄B");

        let adds = log_rows_with_action(&registry, "add");
        assert_eq!(adds.height(), 2);
    }

    #[test]
    fn test_add_requires_name_and_member() {
        let (_temp, registry) = test_registry();

        let no_name = sample_record("  ", "山田");
        assert!(registry.add(&ctx(), &no_name).is_err());

        let no_member = sample_record("銘柄A", "");
        assert!(registry.add(&ctx(), &no_member).is_err());

        assert_eq!(registry.items().unwrap().height(), 0);
    }

    #[test]
    fn test_add_stamps_given_date() {
        let (_temp, registry) = test_registry();
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let record = NewRecord {
            updated_at: Some(date),
            ..sample_record("銘柄A", "山田")
        };
        registry.add(&ctx(), &record).unwrap();

        let items = registry.items().unwrap();
        let ms = items
            .column("updated_at")
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .get(0)
            .unwrap();
        assert_eq!(ms, date.timestamp_millis());
    }

    #[test]
    fn test_update_applies_patch_and_stamps() {
        let (_temp, registry) = test_registry();
        let id = registry.add(&ctx(), &sample_record("旧名", "山田")).unwrap();

        let mut patch = RecordPatch::new();
        patch.set("name", "新名").unwrap();
        patch.set("quantity", "7").unwrap();

        let outcome = registry.update(&ctx(), id, &patch).unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated);

        let items = registry.items().unwrap();
        assert_eq!(column_text(&items, "name", 0).unwrap(), "新名");
        assert_eq!(column_text(&items, "quantity", 0).unwrap(), "7");

        let updates = log_rows_with_action(&registry, "update");
        assert_eq!(updates.height(), 1);
        let changed = column_text(&updates, "changed_fields", 0).unwrap();
        assert!(changed.contains("name"));
        assert!(changed.contains("quantity"));
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let (_temp, registry) = test_registry();
        let mut patch = RecordPatch::new();
        patch.set("name", "x").unwrap();

        let err = registry.update(&ctx(), 99, &patch).unwrap_err();
        assert!(matches!(err, StockbookError::NotFound(_)));
    }

    #[test]
    fn test_update_without_changes_skips_audit() {
        let (_temp, registry) = test_registry();
        let id = registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();

        let mut patch = RecordPatch::new();
        patch.set("name", "銘柄A").unwrap();
        patch.set("category", "純米").unwrap();

        let outcome = registry.update(&ctx(), id, &patch).unwrap();
        assert_eq!(outcome, UpdateOutcome::NoChange);

        let logs = registry.store().load_logs().unwrap();
        assert_eq!(logs.height(), 1);
    }

    #[test]
    fn test_update_rejects_empty_name() {
        let (_temp, registry) = test_registry();
        let id = registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();

        let mut patch = RecordPatch::new();
        patch.set("name", "   ").unwrap();
        assert!(registry.update(&ctx(), id, &patch).is_err());
    }

    #[test]
    fn test_patch_rejects_uneditable_fields() {
        let mut patch = RecordPatch::new();
        assert!(patch.set("id", "5").is_err());
        assert!(patch.set("updated_at", "2024-01-01").is_err());
        assert!(patch.set("覚書", "x").is_err());
        assert!(patch.set("note", "x").is_ok());
    }

    #[test]
    fn test_delete_removes_row_and_logs_before_state() {
        let (_temp, registry) = test_registry();
        registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();
        let id = registry.add(&ctx(), &sample_record("銘柄B", "佐藤")).unwrap();

        registry.delete(&ctx(), id).unwrap();

        let items = registry.items().unwrap();
        assert_eq!(items.height(), 1);
        assert_eq!(column_text(&items, "name", 0).unwrap(), "銘柄A");

        let deletes = log_rows_with_action(&registry, "delete");
        assert_eq!(deletes.height(), 1);
        assert!(column_text(&deletes, "before", 0).unwrap().contains("銘柄B"));
        assert_eq!(column_text(&deletes, "after", 0).unwrap(), "{}");
    }

    #[test]
    fn test_delete_unknown_id_is_not_found() {
        let (_temp, registry) = test_registry();
        let err = registry.delete(&ctx(), 404).unwrap_err();
        assert!(matches!(err, StockbookError::NotFound(_)));
    }

    #[test]
    fn test_bulk_edit_overwrites_appends_and_skips() {
        let (_temp, registry) = test_registry();
        registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();
        registry.add(&ctx(), &sample_record("銘柄B", "佐藤")).unwrap();

        let edited = df! {
            "id" => [Some(1i64), None, Some(99)],
            "name" => ["改名A", "追加C", "無視"],
            "member" => ["山田", "鈴木", "無視"],
        }
        .unwrap();

        let summary = registry.bulk_edit(&ctx(), &edited).unwrap();
        assert_eq!(summary, BulkEditSummary { rows: 1, added: 1 });

        let items = registry.items().unwrap();
        assert_eq!(items.height(), 3);
        assert_eq!(column_text(&items, "name", 0).unwrap(), "改名A");
        assert_eq!(column_text(&items, "name", 1).unwrap(), "銘柄B");
        assert_eq!(column_text(&items, "name", 2).unwrap(), "追加C");
        assert_eq!(column_text(&items, "id", 2).unwrap(), "3");

        let entries = log_rows_with_action(&registry, "bulk_edit");
        assert_eq!(entries.height(), 1);
        let after: serde_json::Value =
            serde_json::from_str(&column_text(&entries, "after", 0).unwrap()).unwrap();
        assert_eq!(after["rows"], 1);
        assert_eq!(after["added"], 1);
    }

    #[test]
    fn test_bulk_edit_appended_rows_are_not_edit_targets() {
        let (_temp, registry) = test_registry();
        registry.add(&ctx(), &sample_record("銘柄A", "山田")).unwrap();

        // Row two carries the id the append in row one will receive.
        let edited = df! {
            "id" => [None, Some(2i64)],
            "name" => ["追加B", "乗っ取り"],
            "member" => ["鈴木", "誰か"],
        }
        .unwrap();

        let summary = registry.bulk_edit(&ctx(), &edited).unwrap();
        assert_eq!(summary, BulkEditSummary { rows: 0, added: 1 });

        let items = registry.items().unwrap();
        assert_eq!(items.height(), 2);
        assert_eq!(column_text(&items, "name", 1).unwrap(), "追加B");
        assert_eq!(column_text(&items, "member", 1).unwrap(), "鈴木");
    }

    #[test]
    fn test_bulk_edit_requires_id_column() {
        let (_temp, registry) = test_registry();
        let edited = df! { "name" => ["x"] }.unwrap();
        assert!(registry.bulk_edit(&ctx(), &edited).is_err());
    }

    #[test]
    fn test_bulk_edit_stamps_every_row() {
        let (_temp, registry) = test_registry();
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let record = NewRecord {
            updated_at: Some(date),
            ..sample_record("銘柄A", "山田")
        };
        registry.add(&ctx(), &record).unwrap();

        let edited = df! {
            "id" => [Some(1i64)],
            "name" => ["銘柄A改"],
        }
        .unwrap();
        let lower = Utc::now().timestamp_millis();
        registry.bulk_edit(&ctx(), &edited).unwrap();

        let items = registry.items().unwrap();
        let ms = items
            .column("updated_at")
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .get(0)
            .unwrap();
        assert!(ms >= lower);
    }

    #[test]
    fn test_import_replaces_store() {
        let (_temp, registry) = test_registry();
        registry.add(&ctx(), &sample_record("旧在庫", "山田")).unwrap();

        let incoming = df! {
            "id" => [10i64, 11],
            "name" => ["新在庫A", "新在庫B"],
        }
        .unwrap();
        let rows = registry.import(&ctx(), &incoming).unwrap();
        assert_eq!(rows, 2);

        let items = registry.items().unwrap();
        assert_eq!(items.height(), 2);
        assert_eq!(column_text(&items, "id", 0).unwrap(), "10");
        assert_eq!(column_text(&items, "name", 1).unwrap(), "新在庫B");
    }
}
