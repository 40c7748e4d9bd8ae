//! Schema normalization.
//!
//! Maps each engine's native column description into [`ColumnDescriptor`].
//! The relational engines go through [`RawColumn`] and [`simplify_type`]; the
//! document engine goes through [`infer_document_columns`].

use crate::models::ColumnDescriptor;
use bson::{Bson, Document};

/// A column as reported by `information_schema` / the system catalogs.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub name: String,
    /// Full engine type, e.g. `int(11) unsigned` or `character varying(255)`
    pub column_type: String,
    /// `YES` / `NO` as reported by `information_schema.columns`
    pub is_nullable: String,
    pub is_primary_key: bool,
}

impl RawColumn {
    pub fn into_descriptor(self) -> ColumnDescriptor {
        let nullable = self.is_nullable.eq_ignore_ascii_case("YES");
        ColumnDescriptor::new(self.name, simplify_type(&self.column_type), nullable)
            .with_raw_type(self.column_type)
            .with_primary_key(self.is_primary_key)
    }
}

pub fn normalize_columns(raw: Vec<RawColumn>) -> Vec<ColumnDescriptor> {
    raw.into_iter().map(RawColumn::into_descriptor).collect()
}

/// Multi-word type names that must survive simplification as one token.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("character varying", "varchar"),
    ("double precision", "double"),
    ("timestamp without time zone", "timestamp"),
    ("timestamp with time zone", "timestamptz"),
    ("time without time zone", "time"),
    ("time with time zone", "timetz"),
    ("bit varying", "varbit"),
];

/// Collapse a declared type to its base name.
///
/// Length/precision qualifiers and modifiers are dropped: `int(11) unsigned`
/// becomes `int`, `numeric(10, 2)` becomes `numeric`,
/// `character varying(255)` becomes `varchar` and `integer[]` becomes
/// `integer_array`. Lossy; only used for display and diagrams.
pub fn simplify_type(declared: &str) -> String {
    let stripped = strip_qualifiers(declared);
    let mut collapsed = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let is_array = collapsed.ends_with("[]");
    while collapsed.ends_with("[]") {
        collapsed.truncate(collapsed.len() - 2);
        collapsed = collapsed.trim_end().to_string();
    }

    let base = TYPE_ALIASES
        .iter()
        .find(|(long, _)| collapsed == *long || collapsed.starts_with(&format!("{} ", long)))
        .map(|(_, short)| short.to_string())
        .unwrap_or_else(|| {
            collapsed
                .split(' ')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown")
                .to_string()
        });

    if is_array {
        format!("{}_array", base)
    } else {
        base
    }
}

/// Remove every parenthesized group, ignoring parentheses inside quotes
/// (MySQL `enum('a(b)', 'c')`).
fn strip_qualifiers(declared: &str) -> String {
    let mut out = String::with_capacity(declared.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in declared.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' if depth > 0 => quote = Some(ch),
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Type name for a BSON value kind.
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::String(_) => "string",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::Boolean(_) => "bool",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Null | Bson::Undefined => "null",
        Bson::Decimal128(_) => "decimal",
        Bson::Binary(_) => "binData",
        Bson::Timestamp(_) => "timestamp",
        Bson::RegularExpression(_) => "regex",
        _ => "mixed",
    }
}

/// Infer columns from a single sampled document.
///
/// This is a one-document heuristic, not a schema: a collection whose
/// documents differ yields only the fields of the sampled one, and fields
/// absent from the sample are not reported. Every field except `_id` is
/// reported nullable since another document may omit it.
pub fn infer_document_columns(sample: &Document) -> Vec<ColumnDescriptor> {
    sample
        .iter()
        .map(|(name, value)| {
            let is_id = name == "_id";
            ColumnDescriptor::new(name.clone(), bson_type_name(value), !is_id).with_primary_key(is_id)
        })
        .collect()
}
