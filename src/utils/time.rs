use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serializer;

pub fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub fn serialize_iso<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso(*dt))
}

pub fn serialize_iso_opt<S: Serializer>(
    dt: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match dt {
        Some(value) => serializer.serialize_str(&to_iso(*value)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::to_iso;

    #[test]
    fn renders_utc_offset() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        assert_eq!(to_iso(dt), "2024-03-01T08:30:00+00:00");
    }
}
