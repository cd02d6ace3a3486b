//! Canonical record schema and the mapping vocabulary built around it

/// Fields every stored record carries, in canonical column order.
pub const REQUIRED_FIELDS: [&str; 5] = ["id", "name", "category", "quantity", "updated_at"];

/// Optional descriptive fields, appended after the required set.
pub const OPTIONAL_FIELDS: [&str; 7] = [
    "member",
    "producer",
    "region",
    "polish_ratio",
    "note",
    "meeting_no",
    "meeting_at",
];

/// Column names that mark a style/classification in uploaded spreadsheets.
/// A row's category is inferred from the first of these that is marked.
pub const STYLE_CANDIDATES: [&str; 9] = [
    "本醸造",
    "特別本醸造",
    "純米",
    "特別純米",
    "吟醸",
    "純米吟醸",
    "大吟醸",
    "純米大吟醸",
    "その他",
];

/// Trimmed cell renderings treated as "not marked" when scanning style columns.
pub const EMPTY_LIKE: [&str; 7] = ["", "0", "False", "false", "×", "✕", "✖"];

/// Keywords that map raw column headers onto canonical fields.
///
/// Per field the keywords are ordered by priority; matching is
/// case-insensitive substring over the raw header. The table is data, not
/// code, so the vocabulary can be reviewed and extended in one place.
pub const MAPPING_KEYWORDS: [(&str, &[&str]); 12] = [
    ("id", &["id", "番号", "no"]),
    ("name", &["銘柄", "商品名", "名称", "品名", "name"]),
    ("category", &["カテゴリ", "区分", "分類", "category"]),
    ("quantity", &["数量", "在庫", "qty", "quantity"]),
    ("updated_at", &["例会日時", "更新日", "更新日時", "updated_at"]),
    ("member", &["会員氏名", "氏名", "名前"]),
    ("producer", &["蔵元", "メーカー", "酒造"]),
    ("region", &["地域", "都道府県", "エリア"]),
    ("polish_ratio", &["精米歩合", "精米", "歩合"]),
    ("note", &["備考", "メモ", "コメント", "note"]),
    ("meeting_no", &["例会"]),
    ("meeting_at", &["例会日時"]),
];

/// All canonical fields in storage order: required first, then optional.
pub fn canonical_fields() -> impl Iterator<Item = &'static str> {
    REQUIRED_FIELDS.into_iter().chain(OPTIONAL_FIELDS)
}

pub fn is_required(field: &str) -> bool {
    REQUIRED_FIELDS.contains(&field)
}

pub fn is_canonical(field: &str) -> bool {
    canonical_fields().any(|f| f == field)
}

/// Keyword list for one canonical field, highest priority first.
pub fn keywords_for(field: &str) -> &'static [&'static str] {
    MAPPING_KEYWORDS
        .iter()
        .find(|(f, _)| *f == field)
        .map_or(&[], |(_, keys)| keys)
}

/// Whether a trimmed cell rendering counts as an unmarked style cell.
pub fn is_empty_like(value: &str) -> bool {
    EMPTY_LIKE.contains(&value.trim())
}

/// Style columns actually present among the given raw headers,
/// in candidate order.
pub fn style_columns_in<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    STYLE_CANDIDATES
        .iter()
        .filter(|cand| headers.iter().any(|h| h.as_ref() == **cand))
        .map(|cand| (*cand).to_string())
        .collect()
}

/// Human-facing label for a canonical field (used by list output).
pub fn display_label(field: &str) -> &str {
    match field {
        "id" => "ID",
        "name" => "銘柄名",
        "category" => "種別",
        "quantity" => "数量",
        "updated_at" => "開催日",
        "member" => "会員氏名",
        "producer" => "蔵元",
        "region" => "地域",
        "polish_ratio" => "精米歩合",
        "note" => "備考",
        "meeting_no" => "例会",
        "meeting_at" => "例会日時",
        other => other,
    }
}
