//! Query-string conventions.
//!
//! ```text
//! ?limit=20&offset=40            pagination
//! ?sort=status,-name             ascending status, then descending name
//! ?fields=title,date             field selection (when enabled)
//! ?color=red&size=m              everything else: exact-match filters
//! ```
//!
//! Translation is purely syntactic and never fails: malformed pagination
//! degrades to "unbounded", repeated keys are ignored.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use tracing::debug;

/// One query parameter's value(s).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParamValue {
    Single(String),
    /// The key appeared more than once.
    Multiple(Vec<String>),
}

impl ParamValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(_) => None,
        }
    }
}

/// Raw query parameters. A key that is absent from the query string is
/// absent from the map.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// Decodes an `application/x-www-form-urlencoded` query string.
pub fn parse_query_string(query: &str) -> QueryParams {
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!("unparseable query string `{query}`: {e}");
            return QueryParams::new();
        }
    };

    let mut params = QueryParams::new();
    for (key, value) in pairs {
        match params.remove(&key) {
            None => {
                params.insert(key, ParamValue::Single(value));
            }
            Some(ParamValue::Single(first)) => {
                params.insert(key, ParamValue::Multiple(vec![first, value]));
            }
            Some(ParamValue::Multiple(mut values)) => {
                values.push(value);
                params.insert(key, ParamValue::Multiple(values));
            }
        }
    }
    params
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Serialized as `1` / `-1`.
impl Serialize for SortOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

/// Translated query-string directives handed to every handler.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct QueryMeta {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Vec<SortField>,
    /// `None` when field selection is disabled, which is distinct from an
    /// empty selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Exact-match filters.
    pub query: BTreeMap<String, String>,
}

/// Builds [`QueryMeta`] from raw parameters.
pub fn translate(params: &QueryParams, field_selection: bool) -> QueryMeta {
    let mut rest = params.clone();

    let limit = rest.remove("limit").and_then(|v| v.as_single().and_then(parse_int));
    let offset = rest.remove("offset").and_then(|v| v.as_single().and_then(parse_int));

    let mut sort: Vec<SortField> = Vec::new();
    if let Some(ParamValue::Single(spec)) = rest.remove("sort") {
        for token in spec.split(',') {
            let (field, order) = match token.strip_prefix('-') {
                Some(field) => (field, SortOrder::Descending),
                None => (token, SortOrder::Ascending),
            };
            if field.is_empty() || sort.iter().any(|s| s.field == field) {
                continue;
            }
            sort.push(SortField { field: field.to_owned(), order });
        }
    }

    let fields = field_selection.then(|| {
        let mut fields: Vec<String> = Vec::new();
        if let Some(ParamValue::Single(list)) = rest.remove("fields") {
            for field in list.split(',') {
                if !field.is_empty() && !fields.iter().any(|f| f == field) {
                    fields.push(field.to_owned());
                }
            }
        }
        fields
    });

    let query = rest
        .into_iter()
        .filter_map(|(key, value)| match value {
            ParamValue::Single(value) => Some((key, value)),
            ParamValue::Multiple(_) => None,
        })
        .collect();

    QueryMeta { limit, offset, sort, fields, query }
}

/// Lenient leading-integer parse: optional whitespace and sign, then digits.
/// Trailing characters are ignored (`"10abc"` is 10).
fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
