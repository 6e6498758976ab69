use serde::{de::Error, Deserialize, Deserializer};

/// Query-string booleans as clients actually send them.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `deserialize_with` target for optional flags. An empty value counts as
/// absent.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_flag(value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Filter {
        #[serde(default, deserialize_with = "deserialize_flag")]
        only_unread: Option<bool>,
    }

    fn filter(query: Value) -> serde_json::Result<Option<bool>> {
        serde_json::from_value::<Filter>(query).map(|parsed| parsed.only_unread)
    }

    #[test]
    fn accepts_common_spellings() {
        for raw in ["true", "1", "YES", " on "] {
            assert_eq!(parse_flag(raw), Some(true), "{raw}");
        }
        for raw in ["false", "0", "No", "off"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag("2"), None);
    }

    #[test]
    fn deserializes_missing_empty_and_invalid() {
        assert_eq!(filter(json!({})).ok().flatten(), None);
        assert_eq!(filter(json!({ "only_unread": "" })).ok().flatten(), None);
        assert_eq!(filter(json!({ "only_unread": "1" })).ok().flatten(), Some(true));
        assert_eq!(filter(json!({ "only_unread": "no" })).ok().flatten(), Some(false));
        assert!(filter(json!({ "only_unread": "maybe" })).is_err());
    }
}
