//! Tabular file I/O for uploads and the store files. The on-disk format is
//! picked by extension: CSV, Parquet or JSON.

use anyhow::{Context as _, Result};
use polars::prelude::*;
use std::path::Path;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn unsupported(ext: &str) -> anyhow::Error {
    anyhow::anyhow!("Unsupported table format '{ext}' (expected csv, parquet or json)")
}

/// Reads a whole table eagerly, then converts string columns that are
/// mostly parseable as datetimes. Spreadsheet exports ship dates as text
/// more often than not.
pub fn load_df(path: &Path) -> Result<DataFrame> {
    let ext = extension_of(path);
    let df = match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_has_header(true)
            .finish()?
            .collect()
            .context("Failed to read CSV")?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        "json" => JsonReader::new(std::fs::File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
        _ => return Err(unsupported(&ext)),
    };

    try_parse_temporal_columns(df)
}

/// Lazy variant for callers that only need the schema or a head sample.
pub fn load_df_lazy(path: &Path) -> Result<LazyFrame> {
    let ext = extension_of(path);
    match ext.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()
            .context("Failed to scan CSV"),
        "parquet" => {
            LazyFrame::scan_parquet(path, Default::default()).context("Failed to scan Parquet")
        }
        "json" => {
            // No truly lazy JSON scan; read eagerly and wrap.
            let df = JsonReader::new(std::fs::File::open(path)?)
                .finish()
                .context("Failed to read JSON")?;
            Ok(df.lazy())
        }
        _ => Err(unsupported(&ext)),
    }
}

/// Converts string columns whose cells mostly cast to datetimes.
pub fn try_parse_temporal_columns(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    let schema = df.schema().clone();

    for (name, dtype) in schema.iter() {
        if dtype.is_primitive_numeric() || dtype.is_temporal() || dtype.is_bool() {
            continue;
        }

        if let Ok(s) = df.column(name) {
            let s = s.as_materialized_series();
            if let Ok(casted) = s.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                && casted.null_count() < s.len() / 2
            {
                let _ = df.replace(name, casted);
            }
        }
    }
    Ok(df)
}

pub fn save_df(df: &mut DataFrame, path: &Path) -> Result<()> {
    if extension_of(path).as_str() == "parquet" {
        let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
        ParquetWriter::new(file)
            .finish(df)
            .context("Failed to write Parquet file")?;
    } else {
        let file = std::fs::File::create(path).context("Failed to create CSV file")?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(df)
            .context("Failed to write CSV file")?;
    }

    Ok(())
}
