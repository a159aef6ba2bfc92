//! Wire types for the tabular store.
//!
//! Records arrive as `{id, createdTime, fields}` where `fields` is an
//! untyped JSON object. [`Fields`] wraps that object with lenient accessors:
//! a value of the wrong type reads as absent instead of failing the whole
//! record, because operators edit these tables by hand.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Backend-assigned record id (`rec…`).
    pub id: String,
    /// Creation time assigned by the backend.
    #[serde(
        rename = "createdTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_time: Option<DateTime<Utc>>,
    /// Field values keyed by column name.
    #[serde(default)]
    pub fields: Fields,
}

/// One page of a list response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Cursor for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

/// Request body for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldsEnvelope<'a> {
    /// Field values to write.
    pub fields: &'a Fields,
}

/// Column values of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    /// Create an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a field is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Check whether any of the given fields is present.
    #[must_use]
    pub fn contains_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.contains(key))
    }

    /// Iterate over field names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every field of `other` over this map.
    pub fn merge(&mut self, other: &Fields) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Non-empty text value. Numbers are rendered as text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            // Single-element lookup arrays show up for linked names
            Value::Array(items) => match items.as_slice() {
                [Value::String(s)] if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Numeric value. Numeric strings are accepted.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        value_as_f64(self.get(key)?)
    }

    /// First present numeric value among `keys`.
    #[must_use]
    pub fn first_number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|key| self.number(key))
    }

    /// First present text value among `keys`.
    #[must_use]
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    /// Numeric values of an array field (lookup/rollup columns).
    /// A scalar number reads as a one-element list.
    #[must_use]
    pub fn numbers(&self, key: &str) -> Vec<f64> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(value_as_f64).collect(),
            Some(other) => value_as_f64(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// String values of an array field (linked record ids).
    #[must_use]
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Checkbox value. Checkbox columns omit the field when unchecked.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|n| n != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "si" | "sí" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Timestamp value. Accepts RFC 3339, naive date-times and plain dates
    /// (interpreted as UTC midnight).
    #[must_use]
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        parse_timestamp(self.get(key)?.as_str()?)
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Parse a timestamp as the backend and its users write them.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_page_deserialize() {
        let page: RecordPage = serde_json::from_value(json!({
            "records": [
                {"id": "rec1", "createdTime": "2025-04-26T00:36:27.000Z", "fields": {"Operador": "Ana"}},
                {"id": "rec2", "fields": {}}
            ],
            "offset": "itr123/rec2"
        }))
        .unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.offset.as_deref(), Some("itr123/rec2"));
        assert_eq!(page.records[0].fields.text("Operador").as_deref(), Some("Ana"));
        assert!(page.records[0].created_time.is_some());
        assert!(page.records[1].created_time.is_none());
    }

    #[test]
    fn test_record_missing_fields_defaults_to_empty() {
        let record: Record = serde_json::from_value(json!({"id": "rec1"})).unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_envelope_serialize() {
        let fields = Fields::new().with("Operador", "Ana");
        let body = serde_json::to_value(FieldsEnvelope { fields: &fields }).unwrap();
        assert_eq!(body, json!({"fields": {"Operador": "Ana"}}));
    }

    #[test]
    fn test_text_accessor() {
        let f = fields(json!({"a": "  Ana ", "b": "", "c": 12, "d": ["Luis"], "e": true}));
        assert_eq!(f.text("a").as_deref(), Some("Ana"));
        assert_eq!(f.text("b"), None);
        assert_eq!(f.text("c").as_deref(), Some("12"));
        assert_eq!(f.text("d").as_deref(), Some("Luis"));
        assert_eq!(f.text("e"), None);
        assert_eq!(f.text("missing"), None);
    }

    #[test]
    fn test_number_accessor_is_lenient() {
        let f = fields(json!({"a": 12.5, "b": "7", "c": "3,5", "d": "n/a", "e": null}));
        assert_eq!(f.number("a"), Some(12.5));
        assert_eq!(f.number("b"), Some(7.0));
        assert_eq!(f.number("c"), Some(3.5));
        assert_eq!(f.number("d"), None);
        assert_eq!(f.number("e"), None);
    }

    #[test]
    fn test_first_number_prefers_earlier_keys() {
        let f = fields(json!({"b": 2, "c": 3}));
        assert_eq!(f.first_number(&["a", "b", "c"]), Some(2.0));
        assert_eq!(f.first_number(&["x"]), None);
    }

    #[test]
    fn test_numbers_accessor() {
        let f = fields(json!({"a": [399, "412", null, 413], "b": 5, "c": "x"}));
        assert_eq!(f.numbers("a"), vec![399.0, 412.0, 413.0]);
        assert_eq!(f.numbers("b"), vec![5.0]);
        assert!(f.numbers("c").is_empty());
        assert!(f.numbers("missing").is_empty());
    }

    #[test]
    fn test_strings_accessor() {
        let f = fields(json!({"links": ["recA", "recB", 3], "one": "recC"}));
        assert_eq!(f.strings("links"), vec!["recA", "recB"]);
        assert_eq!(f.strings("one"), vec!["recC"]);
    }

    #[test]
    fn test_flag_accessor() {
        let f = fields(json!({"a": true, "b": 0, "c": "Sí", "d": "maybe"}));
        assert_eq!(f.flag("a"), Some(true));
        assert_eq!(f.flag("b"), Some(false));
        assert_eq!(f.flag("c"), Some(true));
        assert_eq!(f.flag("d"), None);
        assert_eq!(f.flag("missing"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 4, 26, 0, 36, 27).unwrap();
        assert_eq!(parse_timestamp("2025-04-26T00:36:27.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-26T00:36:27"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-26 00:36:27"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-04-26"),
            Some(Utc.with_ymd_and_hms(2025, 4, 26, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = Fields::new().with("a", 1).with("b", 2);
        base.merge(&Fields::new().with("b", 3).with("c", 4));
        assert_eq!(base.number("b"), Some(3.0));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_from_iterator() {
        let f: Fields = [("Operador", "Ana"), ("Supervisor", "Luis")]
            .into_iter()
            .collect();
        assert_eq!(f.len(), 2);
        assert!(f.contains_any(&["x", "Supervisor"]));
    }
}
