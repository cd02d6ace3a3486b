//! File-backed storage for the item and audit-log tables

use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::catalog;
use crate::error::{Result, ResultExt as _, StockbookError};
use crate::importer;
use crate::registry::audit::AuditEntry;

/// Audit log columns, in file order.
pub const LOG_COLUMNS: [&str; 8] = [
    "ts",
    "user",
    "action",
    "record_id",
    "name",
    "changed_fields",
    "before",
    "after",
];

/// Owns the item and log files plus the process-local write lock.
///
/// Every mutation is a read-modify-write over whole files; callers hold
/// [`RecordStore::guard`] across the cycle so writers within this process
/// serialize. Cross-process coordination is out of scope. Writes go to a
/// sibling temp file first and rename into place, so an interrupted write
/// never tears a store file.
#[derive(Debug)]
pub struct RecordStore {
    items_path: PathBuf,
    logs_path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Store files take a `.csv` or `.parquet` name; anything else is
    /// refused before the first write.
    pub fn new(items_path: PathBuf, logs_path: PathBuf) -> Result<Self> {
        for path in [&items_path, &logs_path] {
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();
            if !matches!(ext.as_str(), "csv" | "parquet") {
                return Err(StockbookError::InvalidPath(format!(
                    "Store files take a .csv or .parquet name: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }
        Ok(Self {
            items_path,
            logs_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn items_path(&self) -> &Path {
        &self.items_path
    }

    pub fn logs_path(&self) -> &Path {
        &self.logs_path
    }

    /// Takes the single-writer lock. A poisoned lock is taken over rather
    /// than propagated; the store files themselves stay consistent thanks
    /// to the atomic writes.
    pub fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the item table, backfilling missing canonical columns and
    /// coercing dtypes. A missing file is an empty store, not an error.
    pub fn load_items(&self) -> Result<DataFrame> {
        if !self.items_path.exists() {
            return empty_items();
        }
        let df = importer::load_df(&self.items_path).map_err(|e| {
            StockbookError::Store(format!(
                "Unreadable item store {}: {e:#}",
                self.items_path.display()
            ))
        })?;
        coerce_items(df)
    }

    /// Writes the item table: canonical columns first, any extra columns
    /// after them in their existing order.
    pub fn save_items(&self, df: &DataFrame) -> Result<()> {
        let mut ordered = order_items_columns(df)?;
        write_atomic(&mut ordered, &self.items_path)?;
        tracing::info!(
            "Saved {} item rows to {}",
            ordered.height(),
            self.items_path.display()
        );
        Ok(())
    }

    pub fn load_logs(&self) -> Result<DataFrame> {
        if !self.logs_path.exists() {
            return empty_logs();
        }
        let df = importer::load_df(&self.logs_path).map_err(|e| {
            StockbookError::Store(format!(
                "Unreadable audit log {}: {e:#}",
                self.logs_path.display()
            ))
        })?;
        coerce_logs(df)
    }

    /// Appends one audit entry. The log is append-only; existing rows are
    /// rewritten verbatim, never edited.
    pub fn append_log(&self, entry: &AuditEntry) -> Result<()> {
        let mut logs = self.load_logs()?;
        let row = log_row(entry)?;
        logs.vstack_mut(&row)?;
        write_atomic(&mut logs, &self.logs_path)?;
        tracing::info!(
            "Appended '{}' audit entry for record {:?}",
            entry.action,
            entry.record_id
        );
        Ok(())
    }

    /// Most recent log entries, newest first.
    pub fn recent_logs(&self, limit: usize) -> Result<DataFrame> {
        let logs = self.load_logs()?;
        let sorted = logs.sort(
            ["ts"],
            SortMultipleOptions::default().with_order_descending(true),
        )?;
        Ok(sorted.head(Some(limit)))
    }
}

fn empty_items() -> Result<DataFrame> {
    let columns = catalog::canonical_fields()
        .map(|field| Series::new_empty(field.into(), &item_dtype(field)).into_column())
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn item_dtype(field: &str) -> DataType {
    match field {
        "id" | "quantity" => DataType::Int64,
        "updated_at" => DataType::Datetime(TimeUnit::Milliseconds, None),
        _ => DataType::String,
    }
}

/// Hand-edited store files drift; reading pulls them back into shape.
/// `id` stays nullable, `quantity` nulls become 0, `updated_at` becomes a
/// millisecond datetime, every other canonical column becomes text.
fn coerce_items(mut df: DataFrame) -> Result<DataFrame> {
    let height = df.height();
    for field in catalog::canonical_fields() {
        if df.column(field).is_err() {
            df.with_column(Series::full_null(field.into(), height, &DataType::String))?;
        }
    }

    // Integer columns go through Float64 so fractional text survives as a
    // truncated number instead of a null.
    let id = df
        .column("id")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .cast(&DataType::Int64)?;
    df.replace("id", id)?;

    let quantity = df
        .column("quantity")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .cast(&DataType::Int64)?
        .fill_null(FillNullStrategy::Zero)?;
    df.replace("quantity", quantity)?;

    let updated = df
        .column("updated_at")?
        .as_materialized_series()
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    df.replace("updated_at", updated)?;

    for field in catalog::canonical_fields() {
        if matches!(field, "id" | "quantity" | "updated_at") {
            continue;
        }
        let s = df.column(field)?.as_materialized_series();
        if s.dtype() != &DataType::String {
            let casted = s.cast(&DataType::String)?;
            df.replace(field, casted)?;
        }
    }
    Ok(df)
}

fn order_items_columns(df: &DataFrame) -> Result<DataFrame> {
    let mut order: Vec<&str> = catalog::canonical_fields()
        .filter(|f| df.column(f).is_ok())
        .collect();
    for name in df.get_column_names_str() {
        if !catalog::is_canonical(name) {
            order.push(name);
        }
    }
    Ok(df.select(order)?)
}

fn empty_logs() -> Result<DataFrame> {
    let columns = LOG_COLUMNS
        .into_iter()
        .map(|name| Series::new_empty(name.into(), &log_dtype(name)).into_column())
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn log_dtype(name: &str) -> DataType {
    match name {
        "ts" => DataType::Datetime(TimeUnit::Milliseconds, None),
        "record_id" => DataType::Int64,
        _ => DataType::String,
    }
}

fn coerce_logs(mut df: DataFrame) -> Result<DataFrame> {
    let height = df.height();
    for name in LOG_COLUMNS {
        if df.column(name).is_err() {
            df.with_column(Series::full_null(name.into(), height, &DataType::String))?;
        }
    }

    let ts = df
        .column("ts")?
        .as_materialized_series()
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    df.replace("ts", ts)?;

    let record_id = df
        .column("record_id")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .cast(&DataType::Int64)?;
    df.replace("record_id", record_id)?;

    for name in LOG_COLUMNS {
        if matches!(name, "ts" | "record_id") {
            continue;
        }
        let s = df.column(name)?.as_materialized_series();
        if s.dtype() != &DataType::String {
            let casted = s.cast(&DataType::String)?;
            df.replace(name, casted)?;
        }
    }
    Ok(df.select(LOG_COLUMNS)?)
}

fn log_row(entry: &AuditEntry) -> Result<DataFrame> {
    let ts = Series::new("ts".into(), vec![entry.ts.timestamp_millis()])
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    let columns = vec![
        ts.into_column(),
        Series::new("user".into(), vec![entry.user.clone()]).into_column(),
        Series::new("action".into(), vec![entry.action.as_str().to_string()]).into_column(),
        Series::new("record_id".into(), vec![entry.record_id]).into_column(),
        Series::new("name".into(), vec![entry.name.clone()]).into_column(),
        Series::new("changed_fields".into(), vec![entry.changed_fields_text()]).into_column(),
        Series::new("before".into(), vec![entry.before.clone()]).into_column(),
        Series::new("after".into(), vec![entry.after.clone()]).into_column(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn write_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    // The temp file keeps the real extension so the writer picks the same
    // format the final path implies.
    let tmp = path.with_extension(format!("tmp.{ext}"));
    importer::save_df(df, &tmp)?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace store file: {}", path.display()))?;
    Ok(())
}
