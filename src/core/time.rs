use serde::de::Error as _;
use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    to_primitive_utc(OffsetDateTime::now_utc())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Accepts RFC 3339 plus the zone-less `YYYY-MM-DDTHH:MM[:SS]` forms that
/// `datetime-local` inputs produce; zone-less values are read as UTC.
pub(crate) fn parse_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

pub(crate) fn deserialize_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime_flexible(&raw).ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, Time};

    fn at(year: i32, month: Month, day: u8, hour: u8, minute: u8) -> PrimitiveDateTime {
        PrimitiveDateTime::new(
            Date::from_calendar_date(year, month, day).unwrap(),
            Time::from_hms(hour, minute, 0).unwrap(),
        )
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(at(2025, Month::January, 2, 10, 20)), "2025-01-02T10:20:00Z");
    }

    #[test]
    fn to_primitive_utc_normalizes_offsets() {
        let shifted = at(2025, Month::January, 2, 13, 20)
            .assume_offset(UtcOffset::from_hms(3, 0, 0).unwrap());
        assert_eq!(to_primitive_utc(shifted), at(2025, Month::January, 2, 10, 20));
    }

    #[test]
    fn parse_flexible_accepts_datetime_local_inputs() {
        let expected = at(2024, Month::January, 1, 0, 0).assume_utc();
        assert_eq!(parse_datetime_flexible("2024-01-01T00:00"), Some(expected));
        assert_eq!(parse_datetime_flexible("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_datetime_flexible("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_datetime_flexible("2024-01-01T03:00:00+03:00"), Some(expected));
        assert_eq!(parse_datetime_flexible("yesterday"), None);
    }
}
