//! Read-only shaping of the item table: list filters, filter option
//! candidates, display formatting. Nothing here mutates the store.

use polars::prelude::*;

use crate::catalog;
use crate::error::Result;

/// Fields the free-word search scans.
const SEARCH_FIELDS: [&str; 5] = ["name", "category", "producer", "region", "member"];

/// Criteria for listing records. All criteria are optional and combine
/// with AND; blank strings mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Exact member name (surrounding whitespace ignored on both sides).
    pub member: Option<String>,
    /// Raw meeting value as stored, not the display label.
    pub meeting: Option<String>,
    /// Case-insensitive substring, matched against any search field.
    pub query: Option<String>,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().is_none_or(|s| s.trim().is_empty())
        }
        blank(&self.member) && blank(&self.meeting) && blank(&self.query)
    }
}

/// Applies a [`ListFilter`] and returns the matching rows.
pub fn filter_items(df: &DataFrame, filter: &ListFilter) -> Result<DataFrame> {
    if filter.is_empty() {
        return Ok(df.clone());
    }

    let height = df.height();
    let member_cells = text_cells(df, "member")?;
    let meeting_cells = text_cells(df, "meeting_no")?;
    let mut search_cells = Vec::with_capacity(SEARCH_FIELDS.len());
    for field in SEARCH_FIELDS {
        search_cells.push(text_cells(df, field)?);
    }

    let member_want = cleaned(&filter.member);
    let meeting_want = cleaned(&filter.meeting);
    let query_want = cleaned(&filter.query).map(|q| q.to_lowercase());

    let mut keep = Vec::with_capacity(height);
    for i in 0..height {
        let mut ok = true;
        if let Some(want) = &member_want {
            ok &= cell_at(&member_cells, i).map(str::trim) == Some(want.as_str());
        }
        if ok && let Some(want) = &meeting_want {
            ok &= cell_at(&meeting_cells, i).map(str::trim) == Some(want.as_str());
        }
        if ok && let Some(q) = &query_want {
            ok &= search_cells.iter().any(|cells| {
                cell_at(cells, i).is_some_and(|v| v.to_lowercase().contains(q.as_str()))
            });
        }
        keep.push(ok);
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Distinct non-blank member names, sorted, for filter pickers.
pub fn member_candidates(df: &DataFrame) -> Result<Vec<String>> {
    let mut names: Vec<String> = text_cells(df, "member")?
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Distinct raw meeting values sorted by meeting number, non-numeric last.
pub fn meeting_options(df: &DataFrame) -> Result<Vec<String>> {
    let mut values: Vec<String> = text_cells(df, "meeting_no")?
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    values.sort();
    values.dedup();
    values.sort_by_key(|v| (meeting_sort_key(v), v.clone()));
    Ok(values)
}

/// Copy of the table shaped for people: polish ratios and meeting numbers
/// formatted, canonical columns renamed to their display labels.
pub fn display_frame(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();

    if out.column("polish_ratio").is_ok() {
        let formatted: Vec<Option<String>> = text_cells(&out, "polish_ratio")?
            .into_iter()
            .map(|v| v.map(|v| format_polish_ratio(&v)))
            .collect();
        out.replace("polish_ratio", Series::new("polish_ratio".into(), formatted))?;
    }

    if out.column("meeting_no").is_ok() {
        let labeled: Vec<Option<String>> = text_cells(&out, "meeting_no")?
            .into_iter()
            .map(|v| v.map(|v| meeting_label(&v)))
            .collect();
        out.replace("meeting_no", Series::new("meeting_no".into(), labeled))?;
    }

    for field in catalog::canonical_fields() {
        if out.column(field).is_ok() {
            out.rename(field, catalog::display_label(field).into())?;
        }
    }
    Ok(out)
}

/// Meeting display label: a numeric value becomes 第N回, anything else
/// passes through.
pub fn meeting_label(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() {
        return String::new();
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => format!("第{}回", v as i64),
        _ => t.to_string(),
    }
}

/// Sort key for meeting values: the first digit run, non-numeric values
/// sorting last.
pub fn meeting_sort_key(raw: &str) -> i64 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(1_000_000_000)
}

/// Polish ratio display. Values at or below 1 are fractions and scale to
/// percent; non-numeric values render empty.
pub fn format_polish_ratio(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() {
        return String::new();
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            let pct = if v <= 1.0 { v * 100.0 } else { v };
            format!("{pct:.0}％")
        }
        _ => String::new(),
    }
}

fn cleaned(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn cell_at(cells: &[Option<String>], i: usize) -> Option<&str> {
    cells.get(i).and_then(|v| v.as_deref())
}

fn text_cells(df: &DataFrame, field: &str) -> Result<Vec<Option<String>>> {
    let Ok(col) = df.column(field) else {
        return Ok(vec![None; df.height()]);
    };
    let s = col.as_materialized_series();
    let mut out = Vec::with_capacity(s.len());
    for i in 0..s.len() {
        let av = s.get(i)?;
        out.push(match av {
            AnyValue::Null => None,
            AnyValue::String(v) => Some(v.to_string()),
            AnyValue::StringOwned(v) => Some(v.to_string()),
            AnyValue::Float32(v) => Some(format!("{v}")),
            AnyValue::Float64(v) => Some(format!("{v}")),
            other => Some(other.to_string()),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;

    fn sample() -> DataFrame {
        df![
            "id" => [1i64, 2, 3],
            "name" => ["朝日山", "梅酒", "寒梅"],
            "category" => ["純米", "その他", "大吟醸"],
            "producer" => [Some("朝日酒造"), Some("蝶矢"), None],
            "region" => ["新潟", "和歌山", "新潟"],
            "member" => [" 山田 ", "佐藤", "山田"],
            "meeting_no" => ["12", "3", "12"],
        ]
        .unwrap()
    }

    #[test]
    fn test_empty_filter_keeps_everything() -> Result<()> {
        let df = sample();
        let out = filter_items(&df, &ListFilter::default())?;
        assert_eq!(out.height(), 3);
        Ok(())
    }

    #[test]
    fn test_member_filter_trims_both_sides() -> Result<()> {
        let df = sample();
        let filter = ListFilter {
            member: Some("山田 ".to_string()),
            ..Default::default()
        };
        let out = filter_items(&df, &filter)?;
        assert_eq!(out.height(), 2);
        Ok(())
    }

    #[test]
    fn test_meeting_filter_matches_raw_value() -> Result<()> {
        let df = sample();
        let filter = ListFilter {
            meeting: Some("3".to_string()),
            ..Default::default()
        };
        let out = filter_items(&df, &filter)?;
        assert_eq!(out.height(), 1);
        let ids = out.column("id")?.as_materialized_series().i64()?.to_vec();
        assert_eq!(ids, vec![Some(2)]);
        Ok(())
    }

    #[test]
    fn test_query_searches_across_fields_case_insensitive() -> Result<()> {
        let df = df![
            "id" => [1i64, 2],
            "name" => ["Asahi", "梅酒"],
            "category" => [None::<&str>, Some("その他")],
            "producer" => ["酒造A", "蝶矢"],
            "region" => ["新潟", "和歌山"],
            "member" => ["山田", "佐藤"],
        ]?;
        let filter = ListFilter {
            query: Some("asahi".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_items(&df, &filter)?.height(), 1);

        let filter = ListFilter {
            query: Some("和歌山".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_items(&df, &filter)?.height(), 1);

        let filter = ListFilter {
            query: Some("見つからない".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_items(&df, &filter)?.height(), 0);
        Ok(())
    }

    #[test]
    fn test_filters_combine_with_and() -> Result<()> {
        let df = sample();
        let filter = ListFilter {
            member: Some("山田".to_string()),
            meeting: Some("12".to_string()),
            query: Some("寒梅".to_string()),
        };
        let out = filter_items(&df, &filter)?;
        assert_eq!(out.height(), 1);
        let ids = out.column("id")?.as_materialized_series().i64()?.to_vec();
        assert_eq!(ids, vec![Some(3)]);
        Ok(())
    }

    #[test]
    fn test_member_candidates_sorted_unique() -> Result<()> {
        let names = member_candidates(&sample())?;
        assert_eq!(names, vec!["佐藤", "山田"]);
        Ok(())
    }

    #[test]
    fn test_meeting_options_numeric_order() -> Result<()> {
        let df = df![
            "meeting_no" => ["12", "3", "臨時", "12"],
        ]?;
        assert_eq!(meeting_options(&df)?, vec!["3", "12", "臨時"]);
        Ok(())
    }

    #[test]
    fn test_meeting_label_vectors() {
        assert_eq!(meeting_label("12"), "第12回");
        assert_eq!(meeting_label("12.0"), "第12回");
        assert_eq!(meeting_label("臨時会"), "臨時会");
        assert_eq!(meeting_label("  "), "");
    }

    #[test]
    fn test_meeting_sort_key_first_digit_run() {
        assert_eq!(meeting_sort_key("第3回"), 3);
        assert_eq!(meeting_sort_key("12"), 12);
        assert_eq!(meeting_sort_key("abc"), 1_000_000_000);
    }

    #[test]
    fn test_polish_ratio_formatting() {
        assert_eq!(format_polish_ratio("0.55"), "55％");
        assert_eq!(format_polish_ratio("55"), "55％");
        assert_eq!(format_polish_ratio("1"), "100％");
        assert_eq!(format_polish_ratio("精米"), "");
        assert_eq!(format_polish_ratio(""), "");
    }

    #[test]
    fn test_display_frame_labels_and_formats() -> Result<()> {
        let df = df![
            "id" => [1i64],
            "name" => ["寒梅"],
            "category" => ["純米"],
            "updated_at" => ["2024-04-01"],
            "polish_ratio" => ["0.5"],
            "meeting_no" => ["12"],
        ]?;
        let out = display_frame(&df)?;
        assert!(out.column("ID").is_ok());
        assert!(out.column("銘柄名").is_ok());
        assert!(out.column("種別").is_ok());
        assert!(out.column("開催日").is_ok());

        let polish: Vec<Option<&str>> = out
            .column("精米歩合")?
            .as_materialized_series()
            .str()?
            .into_iter()
            .collect();
        assert_eq!(polish, vec![Some("50％")]);

        let meeting: Vec<Option<&str>> = out
            .column("例会")?
            .as_materialized_series()
            .str()?
            .into_iter()
            .collect();
        assert_eq!(meeting, vec![Some("第12回")]);
        Ok(())
    }
}
