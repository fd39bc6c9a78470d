//! Source records and their COPY text rendering
//!
//! A [`SourceRecord`] is one decoded element of a source file's JSON array.
//! Records exist only long enough to be validated and serialized into a
//! pending buffer; the file as a whole is never held in memory.

use crate::table::NULL_SENTINEL;
use serde_json::{Map, Value};

/// One decoded record from a source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord(Map<String, Value>);

impl SourceRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a decoded JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(crate::Error::InvalidRecord(format!(
                "expected an object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Field as a string slice, if present and a string
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Field as a float, if present and numeric
    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    /// Field parsed as a `YYYY-MM-DD` date
    pub fn date_field(&self, name: &str) -> Option<chrono::NaiveDate> {
        self.str_field(name)
            .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// Recover the record as a JSON value (for quarantine artifacts)
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Render the record as one tab-delimited COPY text row, in the given
    /// column order. Absent and null fields become the `\N` sentinel. The
    /// row does not include a trailing newline.
    pub fn to_copy_row(&self, columns: &[&str]) -> String {
        let mut row = String::new();
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                row.push('\t');
            }
            match self.0.get(*column) {
                None | Some(Value::Null) => row.push_str(NULL_SENTINEL),
                Some(value) => push_copy_text(&mut row, value),
            }
        }
        row
    }
}

/// Append a JSON value in COPY text form, escaping the characters that
/// carry meaning in the wire format (tab, newline, backslash).
fn push_copy_text(out: &mut String, value: &Value) {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> SourceRecord {
        SourceRecord::from_value(value).expect("Test value should be an object")
    }

    #[test]
    fn test_copy_row_follows_column_order() {
        let rec = record(json!({"name": "Truck 1", "vehicle_id": "V001", "total_mileage": 1250.5}));
        let row = rec.to_copy_row(&["vehicle_id", "name", "total_mileage"]);
        assert_eq!(row, "V001\tTruck 1\t1250.5");
    }

    #[test]
    fn test_null_and_missing_fields_use_sentinel() {
        let rec = record(json!({"vehicle_id": "V001", "name": null}));
        let row = rec.to_copy_row(&["vehicle_id", "name", "total_mileage"]);
        assert_eq!(row, "V001\t\\N\t\\N");
    }

    #[test]
    fn test_copy_text_escapes_delimiters() {
        let rec = record(json!({"origin": "Dock\t7", "destination": "Bay\nNorth"}));
        let row = rec.to_copy_row(&["origin", "destination"]);
        assert_eq!(row, "Dock\\t7\tBay\\nNorth");
    }

    #[test]
    fn test_non_object_value_is_rejected() {
        let result = SourceRecord::from_value(json!([1, 2, 3]));
        assert!(matches!(result, Err(crate::Error::InvalidRecord(_))));
    }

    #[test]
    fn test_integer_values_render_without_decimal() {
        let rec = record(json!({"delivery_time": 48}));
        assert_eq!(rec.to_copy_row(&["delivery_time"]), "48");
    }
}
