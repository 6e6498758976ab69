use chrono::NaiveDate;
use serde_json::{Map, Value};

pub enum NullableValue<T> {
    Omitted,
    Null,
    Value(T),
}

impl<T> NullableValue<T> {
    /// Shape expected by `Option<Option<_>>` changeset fields: outer `None`
    /// leaves the column untouched, `Some(None)` clears it.
    pub fn into_change(self) -> Option<Option<T>> {
        match self {
            NullableValue::Omitted => None,
            NullableValue::Null => Some(None),
            NullableValue::Value(value) => Some(Some(value)),
        }
    }

    /// For NOT NULL columns: an explicit `null` is rejected.
    pub fn into_required(self, field: &str) -> Result<Option<T>, String> {
        match self {
            NullableValue::Omitted => Ok(None),
            NullableValue::Null => Err(format!("{field} cannot be null")),
            NullableValue::Value(value) => Ok(Some(value)),
        }
    }
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue<String>, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::Value(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

pub fn classify_nullable_int(optional_value: Option<&Value>) -> Result<NullableValue<i32>, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(NullableValue::Value)
            .ok_or_else(|| format!("expected 32-bit integer, got {n}")),
        Some(other) => Err(format!("expected integer or null, got {other}")),
    }
}

pub fn classify_nullable_date(
    optional_value: Option<&Value>,
) -> Result<NullableValue<NaiveDate>, String> {
    match classify_nullable(optional_value)? {
        NullableValue::Omitted => Ok(NullableValue::Omitted),
        NullableValue::Null => Ok(NullableValue::Null),
        NullableValue::Value(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(NullableValue::Value)
            .map_err(|_| format!("expected date as YYYY-MM-DD, got {raw}")),
    }
}

/// A JSON object body narrowed to an explicit allow-list of fields.
///
/// Unknown keys are ignored. A body that names none of the allowed fields is
/// rejected, so every accepted update touches at least one column.
pub struct PartialUpdate<'a> {
    fields: &'a Map<String, Value>,
    allowed: &'static [&'static str],
}

impl<'a> PartialUpdate<'a> {
    pub fn parse(body: &'a Value, allowed: &'static [&'static str]) -> Result<Self, String> {
        let fields = body
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;
        if fields.is_empty() {
            return Err("empty payload".to_string());
        }
        if !fields.keys().any(|key| allowed.contains(&key.as_str())) {
            return Err("no valid fields to update".to_string());
        }
        Ok(Self { fields, allowed })
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        if self.allowed.contains(&field) {
            self.fields.get(field)
        } else {
            None
        }
    }

    pub fn string(&self, field: &str) -> Result<NullableValue<String>, String> {
        classify_nullable(self.get(field)).map_err(|err| format!("{field}: {err}"))
    }

    pub fn int(&self, field: &str) -> Result<NullableValue<i32>, String> {
        classify_nullable_int(self.get(field)).map_err(|err| format!("{field}: {err}"))
    }

    pub fn date(&self, field: &str) -> Result<NullableValue<NaiveDate>, String> {
        classify_nullable_date(self.get(field)).map_err(|err| format!("{field}: {err}"))
    }

    /// A present, non-empty string for a NOT NULL column.
    pub fn required_string(&self, field: &str) -> Result<Option<String>, String> {
        match self.string(field)?.into_required(field)? {
            Some(value) if value.trim().is_empty() => Err(format!("{field} must not be empty")),
            Some(value) => Ok(Some(value.trim().to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ALLOWED: &[&str] = &["name", "headcount", "date_birth"];

    #[test]
    fn rejects_body_without_known_fields() {
        let body = json!({ "created_by": "someone" });
        let err = PartialUpdate::parse(&body, ALLOWED).err();
        assert_eq!(err.as_deref(), Some("no valid fields to update"));
    }

    #[test]
    fn rejects_empty_body() {
        let body = json!({});
        assert_eq!(
            PartialUpdate::parse(&body, ALLOWED).err().as_deref(),
            Some("empty payload")
        );
    }

    #[test]
    fn ignores_fields_outside_allow_list() {
        let body = json!({ "name": "Acme", "created_by": "x" });
        let update = PartialUpdate::parse(&body, ALLOWED).unwrap();
        assert!(matches!(update.string("created_by"), Ok(NullableValue::Omitted)));
        assert_eq!(update.required_string("name").unwrap().as_deref(), Some("Acme"));
    }

    #[test]
    fn classifies_ints_and_dates() {
        let body = json!({ "headcount": 12, "date_birth": null });
        let update = PartialUpdate::parse(&body, ALLOWED).unwrap();
        assert_eq!(update.int("headcount").unwrap().into_change(), Some(Some(12)));
        assert_eq!(update.date("date_birth").unwrap().into_change(), Some(None));

        let bad = json!({ "date_birth": "01/02/1990" });
        let update = PartialUpdate::parse(&bad, ALLOWED).unwrap();
        assert!(update.date("date_birth").is_err());
    }

    #[test]
    fn required_fields_refuse_null_and_blank() {
        let body = json!({ "name": null });
        let update = PartialUpdate::parse(&body, ALLOWED).unwrap();
        assert!(update.required_string("name").is_err());

        let body = json!({ "name": "   " });
        let update = PartialUpdate::parse(&body, ALLOWED).unwrap();
        assert!(update.required_string("name").is_err());
    }
}
