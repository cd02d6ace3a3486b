use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;

use crate::catalog;
use crate::importer::mapping::FieldMapping;
use crate::importer::reconcile::reconcile_ids;

/// Formats tried, in order, when a timestamp arrives as text.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Projects an uploaded frame onto the canonical schema.
///
/// Output columns are exactly the canonical fields in canonical order, and
/// the row count always matches the input. Malformed cells never abort the
/// import; they coerce to defaults instead: quantity parses numerically,
/// truncates and falls back to 0, `updated_at` parses against the format
/// list and falls back to the current time, ids go through
/// [`reconcile_ids`]. A row's category comes from the mapped column when the
/// mapping names one (null when this upload lacks that column), otherwise
/// from the name of the first style column whose cell is marked (non-null
/// and not empty-like).
pub fn normalize(
    raw: &DataFrame,
    mapping: &FieldMapping,
    style_columns: &[String],
) -> Result<DataFrame> {
    let height = raw.height();

    let ids = {
        let raw_ids = match mapped_series(raw, mapping.get("id")) {
            Some(s) => numeric_values(s)?,
            None => vec![None; height],
        };
        reconcile_ids(&raw_ids)
    };

    let names = string_values_or_null(raw, mapping.get("name"), height)?;

    // Style inference only runs when category is unmapped; a mapping aimed
    // at a column this upload lacks projects null instead.
    let categories = match mapping.get("category") {
        Some(col) => string_values_or_null(raw, Some(col), height)?,
        None => infer_categories(raw, style_columns)?,
    };

    let quantities: Vec<i64> = match mapped_series(raw, mapping.get("quantity")) {
        Some(s) => {
            let mut out = Vec::with_capacity(height);
            for i in 0..height {
                let av = s.get(i)?;
                out.push(cell_f64(&av).map_or(0, |v| (v as i64).max(0)));
            }
            out
        }
        None => vec![0; height],
    };

    let now_ms = Utc::now().timestamp_millis();
    let updated: Vec<i64> = match mapped_series(raw, mapping.get("updated_at")) {
        Some(s) => {
            let mut out = Vec::with_capacity(height);
            for i in 0..height {
                let av = s.get(i)?;
                out.push(cell_datetime_ms(&av).unwrap_or(now_ms));
            }
            out
        }
        None => vec![now_ms; height],
    };

    let mut columns: Vec<Column> = vec![
        Series::new("id".into(), ids).into_column(),
        Series::new("name".into(), names).into_column(),
        Series::new("category".into(), categories).into_column(),
        Series::new("quantity".into(), quantities).into_column(),
        Series::new("updated_at".into(), updated)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .into_column(),
    ];

    for field in catalog::OPTIONAL_FIELDS {
        // Unmapped optional fields still pick up a raw column named exactly
        // like the canonical field.
        let src = mapped_series(raw, mapping.get(field))
            .or_else(|| raw.column(field).ok().map(|c| c.as_materialized_series()));
        let values = match src {
            Some(s) => string_values(s)?,
            None => vec![None; height],
        };
        columns.push(Series::new(field.into(), values).into_column());
    }

    Ok(DataFrame::new(columns)?)
}

fn mapped_series<'a>(raw: &'a DataFrame, column: Option<&str>) -> Option<&'a Series> {
    column
        .and_then(|c| raw.column(c).ok())
        .map(|c| c.as_materialized_series())
}

fn string_values_or_null(
    raw: &DataFrame,
    column: Option<&str>,
    height: usize,
) -> Result<Vec<Option<String>>> {
    match mapped_series(raw, column) {
        Some(s) => string_values(s),
        None => Ok(vec![None; height]),
    }
}

fn string_values(s: &Series) -> Result<Vec<Option<String>>> {
    let mut out = Vec::with_capacity(s.len());
    for i in 0..s.len() {
        let av = s.get(i)?;
        out.push(cell_string(&av));
    }
    Ok(out)
}

fn numeric_values(s: &Series) -> Result<Vec<Option<f64>>> {
    let mut out = Vec::with_capacity(s.len());
    for i in 0..s.len() {
        let av = s.get(i)?;
        out.push(cell_f64(&av));
    }
    Ok(out)
}

/// Per-row category inference: the first style column whose cell is marked
/// names the category.
fn infer_categories(raw: &DataFrame, style_columns: &[String]) -> Result<Vec<Option<String>>> {
    let height = raw.height();
    let mut style: Vec<(&str, &Series)> = Vec::new();
    for name in style_columns {
        if let Ok(c) = raw.column(name) {
            style.push((name.as_str(), c.as_materialized_series()));
        }
    }

    let mut out = Vec::with_capacity(height);
    for i in 0..height {
        let mut category = None;
        for (name, s) in &style {
            let av = s.get(i)?;
            if let Some(text) = cell_string(&av)
                && !catalog::is_empty_like(&text)
            {
                category = Some((*name).to_string());
                break;
            }
        }
        out.push(category);
    }
    Ok(out)
}

/// Plain text rendering of a cell, without the quoting the Display impl
/// adds around strings. Null is `None`.
pub(crate) fn cell_string(av: &AnyValue<'_>) -> Option<String> {
    match av {
        AnyValue::Null => None,
        AnyValue::String(s) => Some((*s).to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Boolean(b) => Some(b.to_string()),
        AnyValue::Float32(v) => Some(format!("{v}")),
        AnyValue::Float64(v) => Some(format!("{v}")),
        other => Some(other.to_string()),
    }
}

pub(crate) fn cell_f64(av: &AnyValue<'_>) -> Option<f64> {
    match av {
        AnyValue::String(s) => s.trim().parse::<f64>().ok(),
        AnyValue::StringOwned(s) => s.as_str().trim().parse::<f64>().ok(),
        AnyValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        AnyValue::Int8(v) => Some(f64::from(*v)),
        AnyValue::Int16(v) => Some(f64::from(*v)),
        AnyValue::Int32(v) => Some(f64::from(*v)),
        AnyValue::Int64(v) => Some(*v as f64),
        AnyValue::UInt8(v) => Some(f64::from(*v)),
        AnyValue::UInt16(v) => Some(f64::from(*v)),
        AnyValue::UInt32(v) => Some(f64::from(*v)),
        AnyValue::UInt64(v) => Some(*v as f64),
        AnyValue::Float32(v) => Some(f64::from(*v)),
        AnyValue::Float64(v) => Some(*v),
        _ => None,
    }
}

fn cell_datetime_ms(av: &AnyValue<'_>) -> Option<i64> {
    match av {
        AnyValue::Date(days) => Some(i64::from(*days) * 86_400_000),
        AnyValue::Datetime(v, tu, _) => Some(to_millis(*v, *tu)),
        AnyValue::DatetimeOwned(v, tu, _) => Some(to_millis(*v, *tu)),
        AnyValue::String(s) => parse_datetime_text(s),
        AnyValue::StringOwned(s) => parse_datetime_text(s.as_str()),
        _ => None,
    }
}

fn to_millis(v: i64, tu: TimeUnit) -> i64 {
    match tu {
        TimeUnit::Nanoseconds => v / 1_000_000,
        TimeUnit::Microseconds => v / 1_000,
        TimeUnit::Milliseconds => v,
    }
}

fn parse_datetime_text(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
        }
    }
    None
}
